use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sad_engine::config::{expand_path, load_config};
use sad_engine::segment::{read_file, FieldSelector};
use sad_engine::{read_info, splice, Config, OutputMode, Segmentation, WindowKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod batch;
mod pipeline;

use pipeline::{process_file, Outputs};

#[derive(Parser)]
#[command(name = "mergewav")]
#[command(about = "Energy-based speech detection and splicing of WAV files", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: AnalysisArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the config file.
#[derive(Args, Debug, Default)]
struct AnalysisArgs {
    #[arg(long, global = true, help = "Config file (default: ~/.config/mergewav/config.toml)")]
    config: Option<String>,
    #[arg(long, global = true, help = "Channel to analyse, starting at 1")]
    channel: Option<u16>,
    #[arg(long, global = true, help = "Analysis start time in seconds")]
    start: Option<f64>,
    #[arg(long, global = true, help = "Analysis end time in seconds")]
    end: Option<f64>,
    #[arg(long, global = true, help = "Frame length in milliseconds")]
    frame_length: Option<f64>,
    #[arg(long, global = true, help = "Frame shift in milliseconds")]
    frame_shift: Option<f64>,
    #[arg(long, global = true, help = "Weighting window: none, hamming, hanning, blackman")]
    window: Option<WindowKind>,
    #[arg(long, global = true, help = "Speech threshold in speech standard deviations (0 compares likelihoods)")]
    threshold: Option<f64>,
    #[arg(long, global = true, help = "Minimum silence duration in seconds")]
    min_silence: Option<f64>,
    #[arg(long, global = true, help = "Segments to output: silence, speech, both")]
    mode: Option<OutputMode>,
    #[arg(long, global = true, help = "Use linear instead of log energy")]
    linear_energy: bool,
    #[arg(long, global = true, help = "Silence inserted after each spliced segment, in milliseconds")]
    pad_ms: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Detect speech and write the segmentation")]
    Detect {
        input: PathBuf,
        #[arg(short, long, default_value = "-", help = "Segment file, - for stdout")]
        output: PathBuf,
        #[arg(long, help = "Fields to write: any of l (label), s (start), e (end), p (score)")]
        fields: Option<String>,
        #[arg(long, help = "Write a JSON run report")]
        report: Option<PathBuf>,
    },
    #[command(about = "Detect speech and splice it into a new WAV file")]
    Merge {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, help = "Also write the segmentation")]
        segments: Option<PathBuf>,
        #[arg(long, help = "Write a JSON run report")]
        report: Option<PathBuf>,
    },
    #[command(about = "Splice the segments listed in a segment file")]
    Splice {
        input: PathBuf,
        segments: PathBuf,
        output: PathBuf,
    },
    #[command(about = "Merge many files in parallel")]
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, help = "Directory receiving <name>.wav for each input")]
        out_dir: PathBuf,
        #[arg(short, long, default_value_t = default_jobs())]
        jobs: usize,
        #[arg(long, help = "Also write <name>.seg next to each output")]
        segments: bool,
    },
    #[command(about = "Print the effective configuration")]
    Config,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl AnalysisArgs {
    fn apply(&self, config: &mut Config) {
        let a = &mut config.analysis;
        if let Some(channel) = self.channel {
            a.channel = channel;
        }
        if let Some(start) = self.start {
            a.start_time = start;
        }
        if let Some(end) = self.end {
            a.end_time = Some(end);
        }
        if let Some(ms) = self.frame_length {
            a.frame_length_ms = ms;
        }
        if let Some(ms) = self.frame_shift {
            a.frame_shift_ms = ms;
        }
        if let Some(window) = self.window {
            a.window = window;
        }
        if let Some(threshold) = self.threshold {
            a.threshold = threshold;
        }
        if let Some(min_silence) = self.min_silence {
            a.min_silence = min_silence;
        }
        if let Some(mode) = self.mode {
            a.output = mode;
        }
        if self.linear_energy {
            a.log_energy = false;
        }
        if let Some(pad_ms) = self.pad_ms {
            config.splice.pad_ms = pad_ms;
        }
    }

    fn effective_config(&self) -> Result<Config> {
        let path = self.config.as_deref().map(expand_path).transpose()?;
        let mut config = load_config(path.as_deref());
        self.apply(&mut config);
        Ok(config)
    }
}

/// Number of segments ending after `duration` seconds.
fn segments_past_end(list: &Segmentation, duration: f64) -> usize {
    list.iter()
        .filter(|s| s.end().is_some_and(|end| end > duration))
        .count()
}

fn run_splice(input: &Path, segments: &Path, output: &Path, config: &Config) -> Result<()> {
    let list = read_file(segments)
        .with_context(|| format!("Failed to read segments from {}", segments.display()))?;
    if list.is_empty() {
        warn!("{} lists no segments", segments.display());
    }
    let info = read_info(input)?;
    let beyond = segments_past_end(&list, info.duration_seconds());
    if beyond > 0 {
        warn!(
            "{} segments reach past the end of {} ({:.2}s), they will be clamped",
            beyond,
            input.display(),
            info.duration_seconds()
        );
    }
    let summary = splice(input, &list, output, config.splice.pad_ms)?;
    println!(
        "{}: {} segments, {} frames copied, {} frames of padding",
        output.display(),
        summary.segments,
        summary.frames_copied,
        summary.frames_padded
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.options.effective_config()?;

    match cli.command {
        Commands::Detect {
            input,
            output,
            fields,
            report,
        } => {
            let outputs = Outputs {
                wav: None,
                segments: Some(output),
                fields: FieldSelector::parse(fields.as_deref()),
                report,
            };
            process_file(&input, &outputs, &config)?;
        }
        Commands::Merge {
            input,
            output,
            segments,
            report,
        } => {
            let outputs = Outputs {
                wav: Some(output),
                segments,
                fields: FieldSelector::ALL,
                report,
            };
            let summary = process_file(&input, &outputs, &config)?;
            if let Some(spliced) = summary.splice {
                println!(
                    "{}: {} segments, {:.2}s of speech",
                    input.display(),
                    spliced.segments,
                    summary.speech_seconds
                );
            }
        }
        Commands::Splice {
            input,
            segments,
            output,
        } => {
            run_splice(&input, &segments, &output, &config)?;
        }
        Commands::Batch {
            inputs,
            out_dir,
            jobs,
            segments,
        } => {
            let results = batch::run(&inputs, &out_dir, jobs, segments, &config)?;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            for (input, result) in &results {
                match result {
                    Ok(summary) => println!(
                        "{}: {} segments, {:.2}s of speech",
                        input.display(),
                        summary.segments,
                        summary.speech_seconds
                    ),
                    Err(e) => println!("{}: FAILED ({:#})", input.display(), e),
                }
            }
            info!("Batch done: {} ok, {} failed", results.len() - failed, failed);
            if failed > 0 {
                bail!("{} of {} files failed", failed, results.len());
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
