use anyhow::{Context, Result};
use sad_engine::segment::{write_file, FieldSelector};
use sad_engine::{splice, Config, Detector, SpliceSummary, WavSource};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the results of one file go. Every output is optional.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    pub wav: Option<PathBuf>,
    pub segments: Option<PathBuf>,
    pub fields: FieldSelector,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct FileSummary {
    pub segments: usize,
    pub speech_seconds: f64,
    pub splice: Option<SpliceSummary>,
}

/// Detect speech in `input`, then write the requested outputs.
pub fn process_file(input: &Path, outputs: &Outputs, config: &Config) -> Result<FileSummary> {
    let mut source = WavSource::open(input)?;
    let info = *source.info();
    info!(
        "{}: {}Hz, {} channels, {:.2}s",
        input.display(),
        info.sample_rate(),
        info.channels(),
        info.duration_seconds()
    );
    let mut detection = Detector::new(config.analysis.clone())
        .detect(&mut source)
        .with_context(|| format!("Detection failed on {}", input.display()))?;
    detection.report.input = Some(input.to_path_buf());

    if let Some(path) = &outputs.segments {
        write_file(&detection.segmentation, path, outputs.fields)?;
    }
    if let Some(path) = &outputs.report {
        detection.report.write_json(path)?;
    }

    let splice_summary = match &outputs.wav {
        Some(path) => Some(
            splice(input, &detection.segmentation, path, config.splice.pad_ms)
                .with_context(|| {
                    format!("Failed to splice {} into {}", input.display(), path.display())
                })?,
        ),
        None => None,
    };

    let summary = FileSummary {
        segments: detection.segmentation.len(),
        speech_seconds: detection.report.stats.speech_seconds,
        splice: splice_summary,
    };
    info!(
        "{}: {} segments, {:.2}s speech",
        input.display(),
        summary.segments,
        summary.speech_seconds
    );

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
    use sad_engine::segment::read_file;

    /// One second of near silence, one second of loud square wave.
    pub(crate) fn write_test_wav(path: &Path) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..8000 {
            writer.write_sample(if i % 2 == 0 { 2i16 } else { -2 }).unwrap();
        }
        for i in 0..8000 {
            writer.write_sample(if (i / 4) % 2 == 0 { 3000i16 } else { -3000 }).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_process_file_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_test_wav(&input);

        let outputs = Outputs {
            wav: Some(dir.path().join("out.wav")),
            segments: Some(dir.path().join("out.seg")),
            fields: FieldSelector::ALL,
            report: Some(dir.path().join("out.json")),
        };
        let summary = process_file(&input, &outputs, &Config::default()).unwrap();
        assert_eq!(summary.segments, 1);
        assert!(summary.speech_seconds > 0.9);

        let segments = read_file(&dir.path().join("out.seg")).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments.get(0).unwrap().has_name("speech"));

        // speech frames plus 150ms of padding
        let spliced = summary.splice.unwrap();
        assert_eq!(spliced.frames_padded, 1200);
        let reader = WavReader::open(dir.path().join("out.wav")).unwrap();
        assert_eq!(reader.duration() as u64, spliced.frames_copied + 1200);

        assert!(dir.path().join("out.json").exists());
    }

    #[test]
    fn test_process_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.wav");
        let result = process_file(&missing, &Outputs::default(), &Config::default());
        assert!(result.is_err());
    }
}
