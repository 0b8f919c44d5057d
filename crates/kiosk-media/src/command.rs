//! FFmpeg command builder.

use std::path::{Path, PathBuf};

use kiosk_models::EncodingProfile;

use crate::error::{MediaError, MediaResult};
use crate::filter_graph::FilterGraph;

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order; index N is addressed as `[N:v]` in filter graphs
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                path: input.as_ref().to_path_buf(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Append another input. Subsequent input arguments apply to it.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            path: input.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an argument before the most recently added input's `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit how much of the current input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Disable FFmpeg's display-matrix auto-rotation for the current input.
    pub fn no_autorotate(self) -> Self {
        self.input_arg("-noautorotate")
    }

    /// Loop the current input forever.
    pub fn stream_loop(self) -> Self {
        self.input_arg("-stream_loop").input_arg("-1")
    }

    /// Read the current input with the concat demuxer.
    pub fn concat_demuxer(self) -> Self {
        self.input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
    }

    /// Set a typed filter graph.
    pub fn filter_graph(self, graph: &FilterGraph) -> Self {
        self.output_arg("-filter_complex").output_arg(graph.to_string())
    }

    /// Map a stream or filter label to the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Stop at the end of the shortest output stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Apply the video settings of an encoding profile.
    pub fn encoding(self, profile: &EncodingProfile, fps: u32) -> Self {
        self.output_args(profile.video_args(fps))
    }

    /// Apply the audio settings of an encoding profile.
    pub fn audio_encoding(self, profile: &EncodingProfile) -> Self {
        self.output_args(profile.audio_args())
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Check if a program is available, returning its resolved path.
pub fn check_program(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|e| {
        if program.contains("ffprobe") {
            MediaError::FfprobeNotFound(format!("{}: {}", program, e))
        } else {
            MediaError::FfmpegNotFound(format!("{}: {}", program, e))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], needle: &str) -> usize {
        args.iter().position(|a| a == needle).unwrap()
    }

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .no_autorotate()
            .duration(30.0)
            .video_codec("libx264");

        let args = cmd.build_args();
        assert!(args.contains(&"-noautorotate".to_string()));
        assert!(args.contains(&"30.000".to_string()));
        assert!(position(&args, "-t") < position(&args, "-i"));
        assert!(position(&args, "-c:v") > position(&args, "-i"));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_input_args_attach_to_latest_input() {
        let cmd = FfmpegCommand::new("video.mp4", "out.mp4")
            .add_input("music.mp3")
            .stream_loop();
        let args = cmd.build_args();

        let loop_at = position(&args, "-stream_loop");
        let video_at = position(&args, "video.mp4");
        let music_at = position(&args, "music.mp3");
        assert!(video_at < loop_at && loop_at < music_at);
    }

    #[test]
    fn test_concat_demuxer_args() {
        let args = FfmpegCommand::new("list.txt", "joined.mp4")
            .concat_demuxer()
            .codec_copy()
            .build_args();
        let f_at = position(&args, "-f");
        assert_eq!(args[f_at + 1], "concat");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
    }

    #[test]
    fn test_progress_flags_present() {
        let args = FfmpegCommand::new("a.mp4", "b.mp4").build_args();
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:2"]));
        assert_eq!(args[0], "-y");
    }
}
