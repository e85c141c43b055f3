//! Framed signal input
//!
//! A [`SignalSource`] hands out overlapping frames of one channel: the first
//! frame covers samples `[0, len)`, every following frame is shifted by
//! `shift` samples. Sources stop once fewer than `len` samples remain.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SadError, SadResult};

/// Pull-based access to a decoded PCM stream.
pub trait SignalSource {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels.
    fn channels(&self) -> u16;

    /// Fill `out[..len]` with the next frame of `channel` (1-based).
    ///
    /// # Returns
    /// * `Ok(true)` if a full frame was read
    /// * `Ok(false)` once the stream cannot provide a full frame
    fn next_frame(
        &mut self,
        channel: u16,
        len: usize,
        shift: usize,
        out: &mut [f32],
    ) -> SadResult<bool>;
}

/// Frames one channel out of an interleaved sample iterator.
pub struct InterleavedSource<I> {
    samples: I,
    sample_rate: u32,
    channels: u16,
    buffer: VecDeque<f32>,
    skip: usize,
    started: bool,
}

/// In-memory source over 16-bit PCM.
pub type PcmSource = InterleavedSource<std::iter::Map<std::vec::IntoIter<i16>, fn(i16) -> SadResult<i16>>>;

fn ok_sample(sample: i16) -> SadResult<i16> {
    Ok(sample)
}

impl PcmSource {
    /// Wrap interleaved samples held in memory.
    pub fn from_pcm(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        InterleavedSource::new(
            samples.into_iter().map(ok_sample as fn(i16) -> SadResult<i16>),
            sample_rate,
            channels,
        )
    }
}

impl<I> InterleavedSource<I>
where
    I: Iterator<Item = SadResult<i16>>,
{
    pub fn new(samples: I, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            buffer: VecDeque::new(),
            skip: 0,
            started: false,
        }
    }

    /// Read one interleaved sample frame and keep the selected channel.
    /// `None` if the stream ends, including in the middle of a frame.
    fn read_sample(&mut self, channel: u16) -> SadResult<Option<f32>> {
        let mut picked = None;
        for c in 1..=self.channels {
            match self.samples.next() {
                Some(sample) => {
                    let sample = sample?;
                    if c == channel {
                        picked = Some(sample as f32);
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(picked)
    }
}

impl<I> SignalSource for InterleavedSource<I>
where
    I: Iterator<Item = SadResult<i16>>,
{
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn next_frame(
        &mut self,
        channel: u16,
        len: usize,
        shift: usize,
        out: &mut [f32],
    ) -> SadResult<bool> {
        if channel == 0 || channel > self.channels {
            return Err(SadError::InvalidParameters(format!(
                "channel {} out of range 1..={}",
                channel, self.channels
            )));
        }
        if len == 0 || out.len() < len {
            return Err(SadError::InvalidParameters(format!(
                "frame length {} does not fit a {}-sample buffer",
                len,
                out.len()
            )));
        }

        if self.started {
            self.skip += shift;
        }
        self.started = true;

        while self.skip > 0 {
            if self.buffer.pop_front().is_none() && self.read_sample(channel)?.is_none() {
                return Ok(false);
            }
            self.skip -= 1;
        }

        while self.buffer.len() < len {
            match self.read_sample(channel)? {
                Some(sample) => self.buffer.push_back(sample),
                None => return Ok(false),
            }
        }

        for (dst, src) in out[..len].iter_mut().zip(self.buffer.iter()) {
            *dst = *src;
        }
        Ok(true)
    }
}

/// Weighting window applied to each frame before the energy statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    None,
    Hamming,
    Hanning,
    Blackman,
}

impl WindowKind {
    /// Window coefficients for a frame of `len` samples, `None` for the
    /// rectangular window.
    pub fn coefficients(self, len: usize) -> Option<Vec<f32>> {
        if self == WindowKind::None {
            return None;
        }
        if len <= 1 {
            return Some(vec![1.0; len]);
        }

        let denom = (len - 1) as f64;
        let weights = (0..len)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / denom;
                let w = match self {
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Hanning => 0.5 - 0.5 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                    WindowKind::None => 1.0,
                };
                w as f32
            })
            .collect();
        Some(weights)
    }
}

/// Multiply a frame by window weights, sample by sample.
pub fn apply_window(frame: &mut [f32], weights: &[f32]) {
    for (s, w) in frame.iter_mut().zip(weights) {
        *s *= *w;
    }
}

impl FromStr for WindowKind {
    type Err = SadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "rect" => Ok(WindowKind::None),
            "hamming" => Ok(WindowKind::Hamming),
            "hanning" | "hann" => Ok(WindowKind::Hanning),
            "blackman" => Ok(WindowKind::Blackman),
            other => Err(SadError::InvalidParameters(format!(
                "unknown window '{}', valid options: none, hamming, hanning, blackman",
                other
            ))),
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::None => write!(f, "none"),
            WindowKind::Hamming => write!(f, "hamming"),
            WindowKind::Hanning => write!(f, "hanning"),
            WindowKind::Blackman => write!(f, "blackman"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(source: &mut impl SignalSource, channel: u16, len: usize, shift: usize) -> Vec<Vec<f32>> {
        let mut out = vec![0.0; len];
        let mut all = Vec::new();
        while source.next_frame(channel, len, shift, &mut out).unwrap() {
            all.push(out.clone());
        }
        all
    }

    #[test]
    fn test_overlapping_frames() {
        let mut source = PcmSource::from_pcm((0..10).collect(), 16000, 1);
        let got = frames(&mut source, 1, 4, 2);
        assert_eq!(
            got,
            vec![
                vec![0.0, 1.0, 2.0, 3.0],
                vec![2.0, 3.0, 4.0, 5.0],
                vec![4.0, 5.0, 6.0, 7.0],
                vec![6.0, 7.0, 8.0, 9.0],
            ]
        );
    }

    #[test]
    fn test_shift_longer_than_frame() {
        let mut source = PcmSource::from_pcm((0..10).collect(), 16000, 1);
        let got = frames(&mut source, 1, 2, 4);
        assert_eq!(got, vec![vec![0.0, 1.0], vec![4.0, 5.0], vec![8.0, 9.0]]);
    }

    #[test]
    fn test_partial_trailing_frame_is_dropped() {
        let mut source = PcmSource::from_pcm((0..5).collect(), 16000, 1);
        assert_eq!(frames(&mut source, 1, 4, 4).len(), 1);
    }

    #[test]
    fn test_channel_selection() {
        // left = 0,1,2,...  right = 100,101,...
        let interleaved: Vec<i16> = (0..6).flat_map(|i| [i, 100 + i]).collect();
        let mut source = PcmSource::from_pcm(interleaved, 8000, 2);
        let got = frames(&mut source, 2, 3, 3);
        assert_eq!(got, vec![vec![100.0, 101.0, 102.0], vec![103.0, 104.0, 105.0]]);
    }

    #[test]
    fn test_invalid_channel() {
        let mut source = PcmSource::from_pcm(vec![0; 16], 16000, 1);
        let mut out = vec![0.0; 4];
        assert!(source.next_frame(2, 4, 2, &mut out).is_err());
        assert!(source.next_frame(0, 4, 2, &mut out).is_err());
    }

    #[test]
    fn test_window_shapes() {
        let hamming = WindowKind::Hamming.coefficients(5).unwrap();
        assert!((hamming[0] - 0.08).abs() < 1e-6);
        assert!((hamming[2] - 1.0).abs() < 1e-6);
        assert!((hamming[4] - 0.08).abs() < 1e-6);

        let hanning = WindowKind::Hanning.coefficients(5).unwrap();
        assert!(hanning[0].abs() < 1e-6);
        assert!((hanning[2] - 1.0).abs() < 1e-6);

        let blackman = WindowKind::Blackman.coefficients(5).unwrap();
        assert!(blackman[0].abs() < 1e-6);
        assert!((blackman[2] - 1.0).abs() < 1e-6);

        assert!(WindowKind::None.coefficients(5).is_none());
    }

    #[test]
    fn test_apply_window() {
        let mut frame = vec![2.0, 2.0, 2.0];
        apply_window(&mut frame, &[0.5, 1.0, 0.0]);
        assert_eq!(frame, vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_window_names() {
        assert_eq!("Hamming".parse::<WindowKind>().unwrap(), WindowKind::Hamming);
        assert_eq!("hann".parse::<WindowKind>().unwrap(), WindowKind::Hanning);
        assert!("kaiser".parse::<WindowKind>().is_err());
        assert_eq!(WindowKind::Blackman.to_string(), "blackman");
    }
}
