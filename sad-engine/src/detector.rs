//! End-to-end detection: energy profile, model fit, segmentation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::bigauss::{BiGaussian, FitReport};
use crate::config::AnalysisConfig;
use crate::energy::{extract_profile, EnergyProfile, ExtractionOptions, FrameGeometry};
use crate::error::{SadError, SadResult};
use crate::segment::Segmentation;
use crate::segmenter::{SegmentStats, Segmenter, SegmenterOptions};
use crate::signal::SignalSource;

/// Summary of one detection run, serialized as JSON by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    pub analysis: AnalysisConfig,
    pub frames: usize,
    pub frame_shift: f64,
    pub min_energy: Option<f64>,
    pub max_energy: Option<f64>,
    /// `None` when the profile was empty and no fit took place.
    pub fit: Option<FitReport>,
    pub model: Option<BiGaussian>,
    pub stats: SegmentStats,
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> SadResult<()> {
        let file = File::create(path).map_err(|e| SadError::open(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(std::io::Error::from)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Result of [`Detector::detect`].
#[derive(Debug, Clone)]
pub struct Detection {
    pub segmentation: Segmentation,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct Detector {
    config: AnalysisConfig,
}

impl Detector {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn validate(&self) -> SadResult<()> {
        let c = &self.config;
        if c.channel == 0 {
            return Err(SadError::InvalidParameters(
                "channel index starts at 1".to_string(),
            ));
        }
        if !(c.frame_length_ms > 0.0) || !(c.frame_shift_ms > 0.0) {
            return Err(SadError::InvalidParameters(format!(
                "frame length {}ms and shift {}ms must be positive",
                c.frame_length_ms, c.frame_shift_ms
            )));
        }
        if c.min_silence < 0.0 {
            return Err(SadError::InvalidParameters(format!(
                "negative minimum silence duration {}",
                c.min_silence
            )));
        }
        Ok(())
    }

    /// Run the full pipeline over `source`.
    pub fn detect<S>(&self, source: &mut S) -> SadResult<Detection>
    where
        S: SignalSource + ?Sized,
    {
        self.validate()?;

        let c = &self.config;
        let geometry = FrameGeometry::from_ms(c.frame_length_ms, c.frame_shift_ms, source.sample_rate())?;
        info!(
            "Detecting on channel {} of {} at {}Hz: frame {} samples, shift {} samples",
            c.channel,
            source.channels(),
            source.sample_rate(),
            geometry.length,
            geometry.shift
        );

        let options = ExtractionOptions {
            channel: c.channel,
            start_time: c.start_time,
            end_time: c.end_time,
            window: c.window,
            log_energy: c.log_energy,
        };
        let profile = extract_profile(source, &geometry, &options)?;

        self.detect_profile(&profile, geometry.shift_seconds())
    }

    /// Fit and segment an already computed profile whose frames are
    /// `frame_shift` seconds apart.
    pub fn detect_profile(&self, profile: &EnergyProfile, frame_shift: f64) -> SadResult<Detection> {
        self.validate()?;
        let c = &self.config;

        let mut report = RunReport {
            created_at: Utc::now(),
            input: None,
            analysis: c.clone(),
            frames: profile.len(),
            frame_shift,
            min_energy: profile.min(),
            max_energy: profile.max(),
            fit: None,
            model: None,
            stats: SegmentStats::default(),
        };

        let (min, max) = match (profile.min(), profile.max()) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                warn!("Empty energy profile, nothing to segment");
                return Ok(Detection {
                    segmentation: Segmentation::new(),
                    report,
                });
            }
        };

        let mut model = BiGaussian::init(min, max);
        let fit = model.fit(profile.values(), c.max_iterations, c.epsilon)?;

        let options = SegmenterOptions {
            frame_shift,
            start_time: c.start_time,
            end_time: c.end_time,
            threshold: c.threshold,
            min_silence: c.min_silence,
            mode: c.output,
        };
        let (segmentation, stats) = Segmenter::new(&model, options).segment(profile.values());

        report.fit = Some(fit);
        report.model = Some(model);
        report.stats = stats;

        Ok(Detection {
            segmentation,
            report,
        })
    }
}
