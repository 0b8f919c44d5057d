//! Typed FFmpeg filter graphs.
//!
//! Graphs are built as an ordered list of [`FilterNode`]s, each one filter
//! with explicit input and output pad labels, and only serialized to the
//! `-filter_complex` syntax when a command is built. Every builder below
//! produces a fresh graph; graphs are never edited after construction.
//!
//! # Layout of the single-pass graph
//!
//! ```text
//! [0:v] -> rotate? -> scale -> crop|pad -> setsar -> fps -> [base]
//! [base] -> split -> trim 0..N ------------------------\
//!                 -> trim N..N+S -> setpts 2x ---------> concat -> [joined]
//! [1:v] -> format=rgba -> scale -> pad (transparent) -> [ovl]
//! [joined][ovl] -> overlay -> format=yuv420p -> [vout]
//! ```

use std::fmt;

use kiosk_models::timing::{DEGENERATE_CLIP_SECS, SLOWMO_FACTOR};
use kiosk_models::{Rotation, ScaleMode, TargetFormat, Timing};

/// Label of the final video pad in every graph.
pub const OUTPUT_LABEL: &str = "vout";

/// A single filter with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: String,
    args: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a positional or `key=value` argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}={}", self.name, self.args.join(":"))
        }
    }
}

/// One filter wired between labelled pads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNode {
    pub inputs: Vec<String>,
    pub filter: Filter,
    pub outputs: Vec<String>,
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}", self.filter)?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// An immutable filter graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Find the first node using the named filter.
    pub fn find(&self, name: &str) -> Option<&FilterNode> {
        self.nodes.iter().find(|n| n.filter.name() == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.nodes.iter().filter(|n| n.filter.name() == name).count()
    }

    /// Position of the first node using the named filter.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.filter.name() == name)
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

/// Graph plus the input bounds it expects.
#[derive(Debug, Clone)]
pub struct FilterPlan {
    pub graph: FilterGraph,
    /// Seconds of the raw input to read (`-t`)
    pub input_duration: f64,
    /// Label to `-map`
    pub output_label: String,
}

impl FilterPlan {
    /// `-map` argument for the output pad.
    pub fn map_arg(&self) -> String {
        format!("[{}]", self.output_label)
    }
}

/// Incremental graph builder with generated pad labels.
#[derive(Debug)]
pub struct FilterGraphBuilder {
    target: TargetFormat,
    nodes: Vec<FilterNode>,
    next_label: usize,
}

impl FilterGraphBuilder {
    pub fn new(target: TargetFormat) -> Self {
        Self {
            target,
            nodes: Vec::new(),
            next_label: 0,
        }
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("n{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Add a node with one generated output label.
    pub fn push(&mut self, inputs: &[&str], filter: Filter) -> String {
        let out = self.fresh_label();
        self.push_to(inputs, filter, &out);
        out
    }

    /// Add a node writing to a named output label.
    pub fn push_to(&mut self, inputs: &[&str], filter: Filter, output: &str) {
        self.nodes.push(FilterNode {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            filter,
            outputs: vec![output.to_string()],
        });
    }

    /// Add a node with several generated output labels.
    pub fn push_multi(&mut self, inputs: &[&str], filter: Filter, outputs: usize) -> Vec<String> {
        let labels: Vec<String> = (0..outputs).map(|_| self.fresh_label()).collect();
        self.nodes.push(FilterNode {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            filter,
            outputs: labels.clone(),
        });
        labels
    }

    /// Rotation nodes. `Rotation::None` adds nothing.
    pub fn rotate(&mut self, input: &str, rotation: Rotation) -> String {
        match rotation {
            Rotation::None => input.to_string(),
            Rotation::Cw90 => self.push(&[input], Filter::new("transpose").arg("1")),
            Rotation::Cw270 => self.push(&[input], Filter::new("transpose").arg("2")),
            Rotation::Half => {
                let flipped = self.push(&[input], Filter::new("hflip"));
                self.push(&[&flipped], Filter::new("vflip"))
            }
        }
    }

    /// Fit a stream into the target frame by cropping or padding.
    pub fn fit(&mut self, input: &str, mode: ScaleMode) -> String {
        let (w, h) = (self.target.width, self.target.height);
        let fitted = match mode {
            ScaleMode::Crop => {
                let scaled = self.push(&[input], scale_filter(w, h, "increase"));
                self.push(
                    &[&scaled],
                    Filter::new("crop").arg(w.to_string()).arg(h.to_string()),
                )
            }
            ScaleMode::Pad => {
                let scaled = self.push(&[input], scale_filter(w, h, "decrease"));
                self.push(&[&scaled], pad_filter(w, h, "black"))
            }
        };
        let square = self.push(&[&fitted], Filter::new("setsar").arg("1"));
        self.push(
            &[&square],
            Filter::new("fps").arg(self.target.fps.to_string()),
        )
    }

    /// Rotation (optional) followed by the fit.
    pub fn base_chain(
        &mut self,
        input: &str,
        rotation: Option<Rotation>,
        mode: ScaleMode,
    ) -> String {
        let rotated = match rotation {
            Some(r) => self.rotate(input, r),
            None => input.to_string(),
        };
        self.fit(&rotated, mode)
    }

    /// Trim `[start, end)` and reset timestamps, stretching them when `slow`.
    pub fn trim_chain(&mut self, input: &str, start: f64, end: f64, slow: bool) -> String {
        let trimmed = self.push(
            &[input],
            Filter::new("trim")
                .arg(format!("start={:.3}", start))
                .arg(format!("end={:.3}", end)),
        );
        self.push(&[&trimmed], setpts_filter(slow))
    }

    /// Speed-ramped timeline from an already fitted stream.
    pub fn timeline(&mut self, base: &str, timing: &Timing) -> String {
        let n = timing.normal_secs();
        let s = timing.slowmo_secs();
        match (timing.has_normal(), timing.has_slowmo()) {
            (true, true) => {
                let branches = self.push_multi(&[base], Filter::new("split").arg("2"), 2);
                let normal = self.trim_chain(&branches[0], 0.0, n, false);
                let slow = self.trim_chain(&branches[1], n, n + s, true);
                self.push(
                    &[&normal, &slow],
                    Filter::new("concat").arg("n=2").arg("v=1").arg("a=0"),
                )
            }
            (true, false) => self.trim_chain(base, 0.0, n, false),
            (false, true) => self.trim_chain(base, 0.0, s, true),
            (false, false) => self.trim_chain(base, 0.0, DEGENERATE_CLIP_SECS, false),
        }
    }

    /// Scale/pad the overlay image to the target and composite it at the origin.
    pub fn overlay_chain(&mut self, base: &str, overlay_input: &str) -> String {
        let (w, h) = (self.target.width, self.target.height);
        let rgba = self.push(&[overlay_input], Filter::new("format").arg("rgba"));
        let scaled = self.push(&[&rgba], scale_filter(w, h, "decrease"));
        let padded = self.push(&[&scaled], pad_filter(w, h, "black@0"));
        self.push(
            &[base, &padded],
            Filter::new("overlay").arg("0").arg("0").arg("format=auto"),
        )
    }

    /// Terminate the graph in the fixed pixel format under [`OUTPUT_LABEL`].
    pub fn finish(mut self, last: &str) -> FilterGraph {
        self.push_to(&[last], Filter::new("format").arg("yuv420p"), OUTPUT_LABEL);
        FilterGraph { nodes: self.nodes }
    }
}

fn scale_filter(w: u32, h: u32, mode: &str) -> Filter {
    Filter::new("scale")
        .arg(w.to_string())
        .arg(h.to_string())
        .arg(format!("force_original_aspect_ratio={}", mode))
}

fn pad_filter(w: u32, h: u32, color: &str) -> Filter {
    Filter::new("pad")
        .arg(w.to_string())
        .arg(h.to_string())
        .arg("(ow-iw)/2")
        .arg("(oh-ih)/2")
        .arg(format!("color={}", color))
}

fn setpts_filter(slow: bool) -> Filter {
    if slow {
        Filter::new("setpts").arg(format!("{}*(PTS-STARTPTS)", SLOWMO_FACTOR))
    } else {
        Filter::new("setpts").arg("PTS-STARTPTS")
    }
}

/// Fused graph: fit, speed ramp and overlay in one encode.
///
/// Input 0 is the raw clip, input 1 the overlay image. `rotation` is `None`
/// when FFmpeg's own auto-rotation is relied upon.
pub fn build_single_pass(
    timing: &Timing,
    rotation: Option<Rotation>,
    mode: ScaleMode,
    target: TargetFormat,
) -> FilterPlan {
    let mut builder = FilterGraphBuilder::new(target);
    let base = builder.base_chain("0:v", rotation, mode);
    let joined = builder.timeline(&base, timing);
    let composited = builder.overlay_chain(&joined, "1:v");
    FilterPlan {
        graph: builder.finish(&composited),
        input_duration: timing.source_secs(),
        output_label: OUTPUT_LABEL.to_string(),
    }
}

/// Orientation/aspect normalization of the raw clip into the target frame.
pub fn build_normalize(
    timing: &Timing,
    rotation: Option<Rotation>,
    mode: ScaleMode,
    target: TargetFormat,
) -> FilterPlan {
    let mut builder = FilterGraphBuilder::new(target);
    let base = builder.base_chain("0:v", rotation, mode);
    FilterPlan {
        graph: builder.finish(&base),
        input_duration: timing.source_secs(),
        output_label: OUTPUT_LABEL.to_string(),
    }
}

/// One sub-clip of an already normalized intermediate.
pub fn build_segment(start: f64, end: f64, slow: bool, target: TargetFormat) -> FilterPlan {
    let mut builder = FilterGraphBuilder::new(target);
    let trimmed = builder.trim_chain("0:v", start, end, slow);
    let square = builder.push(&[&trimmed], Filter::new("setsar").arg("1"));
    let paced = builder.push(&[&square], Filter::new("fps").arg(target.fps.to_string()));
    FilterPlan {
        graph: builder.finish(&paced),
        input_duration: end,
        output_label: OUTPUT_LABEL.to_string(),
    }
}

/// Overlay composite onto a finished timeline (input 0 video, input 1 image).
pub fn build_overlay(target: TargetFormat) -> FilterPlan {
    let mut builder = FilterGraphBuilder::new(target);
    let composited = builder.overlay_chain("0:v", "1:v");
    FilterPlan {
        graph: builder.finish(&composited),
        input_duration: 0.0,
        output_label: OUTPUT_LABEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetFormat {
        TargetFormat::default()
    }

    fn timing(n: f64, s: f64) -> Timing {
        Timing::new(n, s).unwrap()
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::new("hflip").to_string(), "hflip");
        assert_eq!(
            Filter::new("crop").arg("1080").arg("1920").to_string(),
            "crop=1080:1920"
        );
    }

    #[test]
    fn test_split_and_concat_for_both_segments() {
        let plan = build_single_pass(
            &timing(5.0, 5.0),
            Some(Rotation::None),
            ScaleMode::Pad,
            target(),
        );
        let g = &plan.graph;

        assert_eq!(g.count("split"), 1);
        assert_eq!(g.count("trim"), 2);
        assert_eq!(g.count("concat"), 1);
        assert!((plan.input_duration - 10.0).abs() < 1e-9);

        let text = g.to_string();
        assert!(text.contains("trim=start=0.000:end=5.000"));
        assert!(text.contains("trim=start=5.000:end=10.000"));
        assert!(text.contains("setpts=2*(PTS-STARTPTS)"));
        assert!(text.ends_with("format=yuv420p[vout]"));
    }

    #[test]
    fn test_normal_only_has_no_split() {
        let plan = build_single_pass(
            &timing(6.0, 0.0),
            Some(Rotation::None),
            ScaleMode::Crop,
            target(),
        );
        let g = &plan.graph;
        assert_eq!(g.count("split"), 0);
        assert_eq!(g.count("concat"), 0);
        assert_eq!(g.count("trim"), 1);
        assert!(!g.to_string().contains("2*(PTS"));
        assert!((plan.input_duration - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_slowmo_only_doubles_timestamps() {
        let plan = build_single_pass(&timing(0.0, 4.0), None, ScaleMode::Pad, target());
        let text = plan.graph.to_string();
        assert!(text.contains("trim=start=0.000:end=4.000"));
        assert!(text.contains("setpts=2*(PTS-STARTPTS)"));
        assert_eq!(plan.graph.count("split"), 0);
    }

    #[test]
    fn test_degenerate_timing_emits_one_second() {
        let plan = build_single_pass(&timing(0.0, 0.0), None, ScaleMode::Pad, target());
        assert!(plan.graph.to_string().contains("trim=start=0.000:end=1.000"));
        assert!((plan.input_duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_nodes_precede_scaling() {
        for (rotation, expected) in [
            (Rotation::Cw90, "transpose=1"),
            (Rotation::Cw270, "transpose=2"),
            (Rotation::Half, "hflip"),
        ] {
            let plan = build_single_pass(
                &timing(5.0, 5.0),
                Some(rotation),
                ScaleMode::Pad,
                target(),
            );
            let g = &plan.graph;
            let first = &g.nodes()[0];
            assert_eq!(first.inputs, vec!["0:v".to_string()]);
            assert_eq!(first.filter.to_string(), expected);
            assert!(g.position(first.filter.name()).unwrap() < g.position("scale").unwrap());
        }

        let plan = build_single_pass(
            &timing(5.0, 5.0),
            Some(Rotation::Half),
            ScaleMode::Pad,
            target(),
        );
        assert_eq!(plan.graph.count("vflip"), 1);
    }

    #[test]
    fn test_no_rotation_nodes_when_disabled() {
        let plan = build_single_pass(&timing(5.0, 0.0), None, ScaleMode::Pad, target());
        assert_eq!(plan.graph.count("transpose"), 0);
        assert_eq!(plan.graph.count("hflip"), 0);
        assert_eq!(plan.graph.nodes()[0].filter.name(), "scale");
    }

    #[test]
    fn test_crop_and_pad_fit_target() {
        let crop = build_normalize(&timing(1.0, 0.0), None, ScaleMode::Crop, target());
        let text = crop.graph.to_string();
        assert!(text.contains("scale=1080:1920:force_original_aspect_ratio=increase"));
        assert!(text.contains("crop=1080:1920"));
        assert_eq!(crop.graph.count("pad"), 0);

        let pad = build_normalize(&timing(1.0, 0.0), None, ScaleMode::Pad, target());
        let text = pad.graph.to_string();
        assert!(text.contains("scale=1080:1920:force_original_aspect_ratio=decrease"));
        assert!(text.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black"));
        assert_eq!(pad.graph.count("crop"), 0);
    }

    #[test]
    fn test_overlay_matches_base_dimensions() {
        let plan = build_single_pass(&timing(5.0, 5.0), None, ScaleMode::Crop, target());
        let g = &plan.graph;

        // The image is padded to exactly the same frame as the base stream.
        let overlay_pad = g
            .nodes()
            .iter()
            .filter(|n| n.filter.name() == "pad")
            .last()
            .unwrap();
        assert_eq!(&overlay_pad.filter.args()[..2], ["1080", "1920"]);
        assert!(overlay_pad.filter.to_string().contains("black@0"));

        let overlay = g.find("overlay").unwrap();
        assert_eq!(overlay.inputs.len(), 2);
        assert_eq!(overlay.inputs[1], overlay_pad.outputs[0]);
        assert_eq!(overlay.filter.to_string(), "overlay=0:0:format=auto");
    }

    #[test]
    fn test_labels_are_wired() {
        let plan = build_single_pass(
            &timing(2.0, 3.0),
            Some(Rotation::Cw90),
            ScaleMode::Pad,
            target(),
        );
        let g = &plan.graph;
        let produced: Vec<&String> = g.nodes().iter().flat_map(|n| n.outputs.iter()).collect();
        for node in g.nodes() {
            for input in &node.inputs {
                assert!(
                    input == "0:v" || input == "1:v" || produced.contains(&input),
                    "dangling input {}",
                    input
                );
            }
        }
        assert_eq!(plan.map_arg(), "[vout]");
    }

    #[test]
    fn test_segment_and_overlay_graphs() {
        let slow = build_segment(5.0, 10.0, true, target());
        let text = slow.graph.to_string();
        assert!(text.starts_with("[0:v]trim=start=5.000:end=10.000"));
        assert!(text.contains("fps=30"));

        let overlay = build_overlay(target());
        assert_eq!(overlay.graph.count("overlay"), 1);
        assert_eq!(overlay.graph.count("trim"), 0);
    }
}
