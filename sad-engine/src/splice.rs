//! Concatenate the segments of a WAV file into a new WAV file.
//!
//! Each segment is copied in order and followed by a run of digital silence,
//! so consecutive utterances stay audibly separated.

use std::path::Path;

use hound::WavWriter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SadError, SadResult};
use crate::segment::Segmentation;
use crate::wav::{check_format, open_reader};

/// Totals of one splice run, in sample frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpliceSummary {
    pub segments: usize,
    pub frames_copied: u64,
    pub frames_padded: u64,
}

/// Sample frames of padding for `pad_ms` at `sample_rate`.
pub fn pad_frames(pad_ms: u32, sample_rate: u32) -> u64 {
    pad_ms as u64 * sample_rate as u64 / 1000
}

/// Whether `output` names the same file as `input`, resolving `.`, `..` and
/// symlinks. An output that does not exist yet is resolved through its
/// parent directory.
fn same_file(input: &Path, output: &Path) -> bool {
    let input = match input.canonicalize() {
        Ok(path) => path,
        Err(_) => return false,
    };
    let output = match output.canonicalize() {
        Ok(path) => path,
        Err(_) => {
            let parent = match output.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            match (parent.canonicalize(), output.file_name()) {
                (Ok(dir), Some(name)) => dir.join(name),
                _ => return false,
            }
        }
    };
    input == output
}

/// Copy `segments` of `input` into `output`, appending `pad_ms` of silence
/// after each one. The output keeps the input's format.
pub fn splice(
    input: &Path,
    segments: &Segmentation,
    output: &Path,
    pad_ms: u32,
) -> SadResult<SpliceSummary> {
    if input == output || same_file(input, output) {
        return Err(SadError::InvalidParameters(format!(
            "refusing to splice {} onto itself",
            input.display()
        )));
    }

    let mut reader = open_reader(input)?;
    let spec = reader.spec();
    check_format(input, &spec)?;

    let rate = spec.sample_rate as f64;
    let channels = spec.channels as usize;
    let total_frames = reader.duration() as u64;
    let padding = pad_frames(pad_ms, spec.sample_rate);

    let mut writer = WavWriter::create(output, spec).map_err(|e| match e {
        hound::Error::IoError(io) => SadError::open(output, io),
        other => SadError::Wav(other),
    })?;
    let mut summary = SpliceSummary::default();

    for (index, segment) in segments.iter().enumerate() {
        let (start, end) = match (segment.start(), segment.end()) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                warn!("Segment {} has no start or end time, skipping", index);
                continue;
            }
        };

        let first = ((start.max(0.0) * rate) as u64).min(total_frames);
        let count = (((end - start).max(0.0) * rate) as u64).min(total_frames - first);
        debug!(
            "segment {}: [{:.3}, {:.3}] -> frames {}..{}",
            index,
            start,
            end,
            first,
            first + count
        );

        if count > 0 {
            // first < total_frames, which fits in u32
            reader.seek(first as u32)?;
            let wanted = count as usize * channels;
            let mut copied = 0usize;
            for sample in reader.samples::<i16>().take(wanted) {
                writer.write_sample(sample?)?;
                copied += 1;
            }
            summary.frames_copied += (copied / channels) as u64;
        }

        for _ in 0..padding * channels as u64 {
            writer.write_sample(0i16)?;
        }
        summary.frames_padded += padding;
        summary.segments += 1;
    }

    writer.finalize()?;

    info!(
        "Spliced {} segments from {} into {}: {:.2}s audio, {:.2}s padding",
        summary.segments,
        input.display(),
        output.display(),
        summary.frames_copied as f64 / rate,
        summary.frames_padded as f64 / rate
    );

    Ok(summary)
}
