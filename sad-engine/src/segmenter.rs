//! Energy profile to segmentation
//!
//! Walks the profile frame by frame, classifies each frame as silence or
//! speech, and turns the runs into segments. Silence runs not longer than the
//! minimum silence duration are absorbed into the surrounding speech.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bigauss::BiGaussian;
use crate::error::SadError;
use crate::segment::{Label, SegmentBuilder, Segmentation};

/// Label of emitted silence segments.
pub const SILENCE_LABEL: &str = "sil";
/// Label of emitted speech segments.
pub const SPEECH_LABEL: &str = "speech";

/// Per-frame decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Silence,
    Speech,
}

impl FrameClass {
    pub fn label_name(self) -> &'static str {
        match self {
            FrameClass::Silence => SILENCE_LABEL,
            FrameClass::Speech => SPEECH_LABEL,
        }
    }
}

/// Which segments end up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Silence,
    #[default]
    Speech,
    Both,
}

impl OutputMode {
    pub fn includes(self, class: FrameClass) -> bool {
        matches!(
            (self, class),
            (OutputMode::Both, _)
                | (OutputMode::Silence, FrameClass::Silence)
                | (OutputMode::Speech, FrameClass::Speech)
        )
    }
}

impl FromStr for OutputMode {
    type Err = SadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silence" | "sil" => Ok(OutputMode::Silence),
            "speech" => Ok(OutputMode::Speech),
            "both" => Ok(OutputMode::Both),
            other => Err(SadError::InvalidParameters(format!(
                "unknown output mode '{}', valid options: silence, speech, both",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Silence => write!(f, "silence"),
            OutputMode::Speech => write!(f, "speech"),
            OutputMode::Both => write!(f, "both"),
        }
    }
}

/// Segmentation rules.
#[derive(Debug, Clone)]
pub struct SegmenterOptions {
    /// Frame shift in seconds; frame `i` starts at `i * frame_shift`.
    pub frame_shift: f64,
    /// Added to every emitted time.
    pub start_time: f64,
    /// Snap the last segment end to this time when within one frame shift.
    pub end_time: Option<f64>,
    /// Deviation from the speech mean, in speech standard deviations, under
    /// which a frame is silence. `0.0` compares model likelihoods instead.
    pub threshold: f64,
    /// Silence runs must be strictly longer than this (seconds) to be kept.
    pub min_silence: f64,
    pub mode: OutputMode,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            frame_shift: 0.01,
            start_time: 0.0,
            end_time: None,
            threshold: 0.0,
            min_silence: 0.5,
            mode: OutputMode::Speech,
        }
    }
}

/// Count and total duration of the emitted segments of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub silence_segments: usize,
    pub silence_seconds: f64,
    pub speech_segments: usize,
    pub speech_seconds: f64,
}

/// Appends segments that pass the output filter and keeps the statistics.
struct Emitter {
    builder: SegmentBuilder,
    stats: SegmentStats,
    offset: f64,
    mode: OutputMode,
    silence: Label,
    speech: Label,
}

impl Emitter {
    fn new(offset: f64, mode: OutputMode) -> Self {
        Self {
            builder: SegmentBuilder::new(),
            stats: SegmentStats::default(),
            offset,
            mode,
            silence: Label::single(SILENCE_LABEL),
            speech: Label::single(SPEECH_LABEL),
        }
    }

    fn emit(&mut self, class: FrameClass, start: f64, end: f64) {
        if !self.mode.includes(class) {
            return;
        }

        let label = match class {
            FrameClass::Silence => {
                self.stats.silence_segments += 1;
                self.stats.silence_seconds += end - start;
                self.silence.clone()
            }
            FrameClass::Speech => {
                self.stats.speech_segments += 1;
                self.stats.speech_seconds += end - start;
                self.speech.clone()
            }
        };

        debug!(
            "segment {} [{:.3}, {:.3}]",
            class.label_name(),
            self.offset + start,
            self.offset + end
        );
        self.builder
            .add_segment(self.offset + start, self.offset + end, label);
    }
}

/// Classifies frames against a fitted model and builds the segmentation.
pub struct Segmenter<'a> {
    model: &'a BiGaussian,
    options: SegmenterOptions,
}

impl<'a> Segmenter<'a> {
    pub fn new(model: &'a BiGaussian, options: SegmenterOptions) -> Self {
        Self { model, options }
    }

    /// Class of a single frame energy. Equal likelihoods count as speech.
    pub fn classify(&self, energy: f64) -> FrameClass {
        if self.options.threshold != 0.0 {
            let speech = self.model.speech();
            let boundary = speech.mean - self.options.threshold * speech.std_dev();
            if energy < boundary {
                FrameClass::Silence
            } else {
                FrameClass::Speech
            }
        } else if self.model.silence().log_likelihood(energy)
            > self.model.speech().log_likelihood(energy)
        {
            FrameClass::Silence
        } else {
            FrameClass::Speech
        }
    }

    /// Convert a profile into segments. An empty profile gives an empty
    /// segmentation.
    pub fn segment(&self, profile: &[f64]) -> (Segmentation, SegmentStats) {
        let opts = &self.options;
        let mut out = Emitter::new(opts.start_time, opts.mode);

        if profile.is_empty() {
            return (out.builder.finish(), out.stats);
        }

        let mut state: Option<FrameClass> = None;
        let mut silence_start = 0.0;
        let mut speech_start = 0.0;
        let mut speech_end: Option<f64> = None;

        for (i, &energy) in profile.iter().enumerate() {
            let class = self.classify(energy);
            let t = i as f64 * opts.frame_shift;

            match (state, class) {
                (Some(FrameClass::Speech), FrameClass::Silence) => {
                    // speech may end here, pending the silence length
                    speech_end = Some(t);
                    silence_start = t;
                }
                (Some(FrameClass::Silence), FrameClass::Speech) => {
                    if t - silence_start > opts.min_silence {
                        if let Some(end) = speech_end {
                            out.emit(FrameClass::Speech, speech_start, end);
                        }
                        out.emit(FrameClass::Silence, silence_start, t);
                        speech_start = t;
                    }
                }
                _ => {}
            }

            state = Some(class);
        }

        let t = profile.len() as f64 * opts.frame_shift;
        match state {
            Some(FrameClass::Silence) if t - silence_start > opts.min_silence => {
                if let Some(end) = speech_end {
                    out.emit(FrameClass::Speech, speech_start, end);
                }
                out.emit(FrameClass::Silence, silence_start, t);
            }
            // short trailing silence extends the speech to the end
            Some(_) => out.emit(FrameClass::Speech, speech_start, t),
            None => {}
        }

        if let Some(end_time) = opts.end_time {
            if let Some(last) = out.builder.tail_mut() {
                if let Some(end) = last.end() {
                    if (end_time - end).abs() < opts.frame_shift {
                        last.set_end(Some(end_time));
                    }
                }
            }
        }

        info!(
            "Segmentation: {} silence segments ({:.2}s), {} speech segments ({:.2}s)",
            out.stats.silence_segments,
            out.stats.silence_seconds,
            out.stats.speech_segments,
            out.stats.speech_seconds
        );

        (out.builder.finish(), out.stats)
    }
}
