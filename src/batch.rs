//! Process many files on a pool of worker threads.

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, unbounded};
use sad_engine::segment::FieldSelector;
use sad_engine::Config;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, info};

use crate::pipeline::{process_file, FileSummary, Outputs};

/// Output paths for `input` inside `out_dir`: `<stem>.wav` and `<stem>.seg`.
fn outputs_for(input: &Path, out_dir: &Path, with_segments: bool) -> Outputs {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    Outputs {
        wav: Some(out_dir.join(format!("{}.wav", stem))),
        segments: with_segments.then(|| out_dir.join(format!("{}.seg", stem))),
        fields: FieldSelector::ALL,
        report: None,
    }
}

/// Run the detect-and-splice pipeline over `inputs` with `jobs` workers.
/// Returns the per-file results in input order.
pub fn run(
    inputs: &[PathBuf],
    out_dir: &Path,
    jobs: usize,
    with_segments: bool,
    config: &Config,
) -> Result<Vec<(PathBuf, Result<FileSummary>)>> {
    if inputs.is_empty() {
        bail!("No input files given");
    }
    std::fs::create_dir_all(out_dir)?;

    let mut stems: Vec<_> = inputs.iter().filter_map(|p| p.file_stem()).collect();
    stems.sort();
    stems.dedup();
    if stems.len() != inputs.len() {
        bail!("Input files must have distinct names, outputs would collide in {}", out_dir.display());
    }

    let workers = jobs.clamp(1, inputs.len());
    info!("Processing {} files with {} workers", inputs.len(), workers);

    let (job_tx, job_rx) = bounded::<(usize, PathBuf)>(workers * 2);
    let (result_tx, result_rx) = unbounded::<(usize, Result<FileSummary>)>();

    thread::scope(|scope| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, input) in job_rx.iter() {
                    debug!("worker {} takes {}", worker, input.display());
                    let outputs = outputs_for(&input, out_dir, with_segments);
                    let result = process_file(&input, &outputs, config);
                    if let Err(e) = &result {
                        error!("{}: {:#}", input.display(), e);
                    }
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (index, input) in inputs.iter().enumerate() {
            if job_tx.send((index, input.clone())).is_err() {
                break;
            }
        }
        drop(job_tx);
    });

    let mut results: Vec<Option<Result<FileSummary>>> = inputs.iter().map(|_| None).collect();
    for (index, result) in result_rx.iter() {
        results[index] = Some(result);
    }

    Ok(inputs
        .iter()
        .cloned()
        .zip(results)
        .map(|(input, result)| {
            let result = result.unwrap_or_else(|| Err(anyhow::anyhow!("worker exited before processing")));
            (input, result)
        })
        .collect())
}
