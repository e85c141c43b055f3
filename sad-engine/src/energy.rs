//! Frame energy profile
//!
//! Computes one energy value per analysis frame over an optional
//! `[start, end]` time window, tracking the global minimum and maximum.

use tracing::{debug, info};

use crate::error::{SadError, SadResult};
use crate::signal::{apply_window, SignalSource, WindowKind};

/// Energies below this value are clamped before taking the logarithm.
pub const ENERGY_FLOOR: f64 = 1.0;

const INITIAL_CAPACITY: usize = 40_000;
const GROWTH_STEP: usize = 10_000;

/// Append-only sequence of per-frame energies with running min/max.
#[derive(Debug, Clone)]
pub struct EnergyProfile {
    values: Vec<f64>,
    min: f64,
    max: f64,
}

impl EnergyProfile {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Empty profile with room reserved for `capacity` frames.
    pub fn try_with_capacity(capacity: usize) -> SadResult<Self> {
        let mut profile = Self::new();
        profile.values.try_reserve(capacity)?;
        Ok(profile)
    }

    /// Build a profile from precomputed energies.
    pub fn from_values(values: Vec<f64>) -> Self {
        let mut profile = Self::new();
        for &v in &values {
            profile.track(v);
        }
        profile.values = values;
        profile
    }

    /// Append one frame energy.
    pub fn push(&mut self, value: f64) -> SadResult<()> {
        if self.values.len() == self.values.capacity() {
            self.values.try_reserve(GROWTH_STEP)?;
        }
        self.values.push(value);
        self.track(value);
        Ok(())
    }

    fn track(&mut self, value: f64) {
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }
}

impl Default for EnergyProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame length and shift in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub length: usize,
    pub shift: usize,
    pub sample_rate: u32,
}

impl FrameGeometry {
    /// Derive sample counts from millisecond durations (truncated).
    pub fn from_ms(length_ms: f64, shift_ms: f64, sample_rate: u32) -> SadResult<Self> {
        let length = (length_ms * sample_rate as f64 / 1000.0) as usize;
        let shift = (shift_ms * sample_rate as f64 / 1000.0) as usize;

        if length == 0 || shift == 0 {
            return Err(SadError::InvalidParameters(format!(
                "frame length {}ms / shift {}ms give no samples at {}Hz",
                length_ms, shift_ms, sample_rate
            )));
        }

        Ok(Self {
            length,
            shift,
            sample_rate,
        })
    }

    /// Frame shift in seconds.
    pub fn shift_seconds(&self) -> f64 {
        self.shift as f64 / self.sample_rate as f64
    }

    /// Index of the frame starting at or before `time` seconds.
    pub fn frame_at(&self, time: f64) -> u64 {
        (time * self.sample_rate as f64 / self.shift as f64) as u64
    }
}

/// Extraction window and energy options.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// 1-based channel index
    pub channel: u16,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub window: WindowKind,
    pub log_energy: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            channel: 1,
            start_time: 0.0,
            end_time: None,
            window: WindowKind::None,
            log_energy: true,
        }
    }
}

/// Root mean square of a frame.
pub fn frame_energy(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| s as f64 * s as f64).sum();
    (sum / frame.len() as f64).sqrt()
}

/// Natural log of an energy value, floored at [`ENERGY_FLOOR`].
pub fn log_energy(energy: f64) -> f64 {
    energy.max(ENERGY_FLOOR).ln()
}

/// Compute the energy profile of `source`.
///
/// Frames before the start time are read, so frame phase stays aligned with
/// the beginning of the signal, but are not recorded. With an end time the
/// extraction stops after the frames spanning the window (at least one).
pub fn extract_profile<S>(
    source: &mut S,
    geometry: &FrameGeometry,
    options: &ExtractionOptions,
) -> SadResult<EnergyProfile>
where
    S: SignalSource + ?Sized,
{
    if options.start_time < 0.0 {
        return Err(SadError::InvalidParameters(format!(
            "negative start time {}",
            options.start_time
        )));
    }

    let first_frame = geometry.frame_at(options.start_time);
    let frame_budget = match options.end_time {
        Some(end) if end < options.start_time => {
            return Err(SadError::InvalidParameters(format!(
                "end time {} precedes start time {}",
                end, options.start_time
            )));
        }
        Some(end) => Some((geometry.frame_at(end) - first_frame).max(1)),
        None => None,
    };

    let mut frame = vec![0.0f32; geometry.length];
    let weights = options.window.coefficients(geometry.length);
    let mut profile = EnergyProfile::try_with_capacity(INITIAL_CAPACITY)?;

    let mut index: u64 = 0;
    while source.next_frame(options.channel, geometry.length, geometry.shift, &mut frame)? {
        if index < first_frame {
            index += 1;
            continue;
        }

        if let Some(w) = &weights {
            apply_window(&mut frame, w);
        }

        let energy = frame_energy(&frame);
        let value = if options.log_energy {
            log_energy(energy)
        } else {
            energy
        };
        profile.push(value)?;

        index += 1;
        if frame_budget == Some(profile.len() as u64) {
            break;
        }
    }

    debug!(
        "extract_profile: skipped {} leading frames, window {}",
        first_frame.min(index),
        options.window
    );
    info!(
        "Energy profile: {} frames, min={:.3}, max={:.3}",
        profile.len(),
        profile.min().unwrap_or(0.0),
        profile.max().unwrap_or(0.0)
    );

    Ok(profile)
}
