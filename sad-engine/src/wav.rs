//! RIFF/WAVE input via hound

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};
use tracing::debug;

use crate::error::{SadError, SadResult};
use crate::signal::{InterleavedSource, SignalSource};

type SampleIter = Box<dyn Iterator<Item = SadResult<i16>> + Send>;

/// Header facts of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub spec: WavSpec,
    /// Sample frames (one sample per channel)
    pub frames: u32,
}

impl WavInfo {
    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.spec.sample_rate as f64
    }
}

/// Open `path` with hound, reporting a missing or unreadable file as
/// [`SadError::Open`].
pub(crate) fn open_reader(path: &Path) -> SadResult<WavReader<BufReader<File>>> {
    WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) => SadError::open(path, io),
        other => SadError::Wav(other),
    })
}

/// Reject anything but 16-bit integer PCM.
pub(crate) fn check_format(path: &Path, spec: &WavSpec) -> SadResult<()> {
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(SadError::UnsupportedFormat(format!(
            "{}: {}-bit {:?} samples, expected 16-bit integer PCM",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        )));
    }
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(SadError::UnsupportedFormat(format!(
            "{}: {} channels at {}Hz",
            path.display(),
            spec.channels,
            spec.sample_rate
        )));
    }
    Ok(())
}

/// Read the header of a WAV file.
pub fn read_info(path: &Path) -> SadResult<WavInfo> {
    let reader = open_reader(path)?;
    Ok(WavInfo {
        spec: reader.spec(),
        frames: reader.duration(),
    })
}

/// Streaming [`SignalSource`] over a 16-bit PCM WAV file.
pub struct WavSource {
    info: WavInfo,
    inner: InterleavedSource<SampleIter>,
}

impl WavSource {
    pub fn open(path: &Path) -> SadResult<Self> {
        let reader = open_reader(path)?;
        let spec = reader.spec();
        check_format(path, &spec)?;

        let info = WavInfo {
            spec,
            frames: reader.duration(),
        };
        debug!(
            "Opened {}: {}Hz, {} channel(s), {:.2}s",
            path.display(),
            info.sample_rate(),
            info.channels(),
            info.duration_seconds()
        );

        let samples: SampleIter = Box::new(
            reader
                .into_samples::<i16>()
                .map(|s| s.map_err(SadError::from)),
        );

        Ok(Self {
            info,
            inner: InterleavedSource::new(samples, spec.sample_rate, spec.channels),
        })
    }

    pub fn info(&self) -> &WavInfo {
        &self.info
    }
}

impl SignalSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn next_frame(
        &mut self,
        channel: u16,
        len: usize,
        shift: usize,
        out: &mut [f32],
    ) -> SadResult<bool> {
        self.inner.next_frame(channel, len, shift, out)
    }
}
