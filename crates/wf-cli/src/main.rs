//! wav2flac: batch WAV → FLAC converter
//!
//! Usage:
//!   wav2flac take1.wav take2.wav              - Convert, keep rate and depth
//!   wav2flac -r ./session --sample-rate 48000 - Convert a folder tree to 48 kHz
//!   wav2flac *.wav --bit-depth 16 -c 8        - 16-bit, maximum compression
//!
//! Ctrl-C cancels the batch after the current block; files not yet reached
//! are left untouched.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use clap::Parser;
use wf_convert::{
    BatchSummary, ConversionEngine, ConversionSettings, EngineConfig, Job, JobQueue, JobStatus, ProgressEvent,
};

#[derive(Parser)]
#[command(name = "wav2flac", version, about = "Batch convert WAV files to FLAC")]
struct Cli {
    /// WAV files or directories to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Output sample rate (0 = keep original)
    #[arg(long, default_value_t = 0)]
    sample_rate: u32,

    /// Output bit depth: 16, 24 or 0 to keep original
    #[arg(long, default_value_t = 0)]
    bit_depth: u8,

    /// FLAC compression level (0-8)
    #[arg(short, long, default_value_t = wf_convert::DEFAULT_COMPRESSION_LEVEL)]
    compression: u8,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames per processing block
    #[arg(long)]
    block_size: Option<usize>,

    /// Leave partially written files behind on failure or cancel
    #[arg(long)]
    keep_partial: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = engine_config(&cli)?;
    let settings = ConversionSettings::from_raw(cli.sample_rate, cli.bit_depth, cli.compression)
        .context("Invalid conversion settings")?;

    let mut queue = JobQueue::new(ConversionEngine::native(config));
    for input in &cli.inputs {
        if input.is_dir() {
            let added = queue
                .add_dir(input, cli.recursive)
                .with_context(|| format!("Failed to scan {}", input.display()))?;
            log::debug!("{}: {} files", input.display(), added);
        } else if queue.add([input]) == 0 {
            log::warn!("Skipping {} (not a WAV file or already queued)", input.display());
        }
    }

    if queue.is_empty() {
        bail!("No WAV files to convert");
    }

    let cancel = queue.engine().cancel_flag();
    ctrlc::set_handler(move || {
        log::warn!("Interrupted, cancelling after the current block");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    log::info!(
        "Converting {} files with the {} backend (rate: {}, depth: {}, level {})",
        queue.len(),
        queue.engine().backend().name(),
        describe(settings.target_sample_rate.map(|r| format!("{} Hz", r))),
        describe(settings.target_bit_depth.map(|d| format!("{} bit", d.bits()))),
        settings.compression_level
    );

    if !queue.start(settings) {
        bail!("Conversion could not be started");
    }

    let total = queue.len();
    queue.wait(|event, job| report(event, job, total));

    let summary = queue
        .finish()
        .context("Conversion worker failed")?
        .context("Conversion produced no result")?;

    print_summary(&summary, queue.jobs());

    if summary.cancelled {
        bail!("Conversion cancelled");
    }
    if !summary.is_success() {
        bail!("{} of {} files failed", summary.total - summary.completed, summary.total);
    }
    Ok(())
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(frames) = cli.block_size {
        config = config.with_block_size(frames);
    }
    if cli.keep_partial {
        config = config.with_delete_partial_output(false);
    }
    Ok(config)
}

fn describe(value: Option<String>) -> String {
    value.unwrap_or_else(|| "keep".to_string())
}

fn report(event: &ProgressEvent, job: Option<&Job>, total: usize) {
    let name = job.map(Job::file_name).unwrap_or_default();

    match (event.job_index, event.status) {
        (Some(index), JobStatus::Converting) => log::info!("[{}/{}] {}", index + 1, total, name),
        (Some(_), JobStatus::Done) => log::info!("  done {}", name),
        (Some(_), JobStatus::Error) => log::error!("  {}", event.error_message),
        (None, _) => {
            if let Some(fraction) = event.file_progress {
                log::debug!("  {} {:5.1}%", name, fraction * 100.0);
            }
        }
        _ => {}
    }
}

/// One line per job that did not reach Done
fn unfinished_lines(summary: &BatchSummary, jobs: &[Job]) -> Vec<String> {
    jobs.iter()
        .enumerate()
        .filter_map(|(index, job)| match job.status {
            JobStatus::Done => None,
            JobStatus::Error => Some(format!(
                "{:<11} {}: {}",
                job.status.label(),
                job.input_path.display(),
                job.error_message
            )),
            JobStatus::Converting if summary.interrupted_job == Some(index) => {
                Some(format!("{:<11} {}", "Interrupted", job.input_path.display()))
            }
            status => Some(format!("{:<11} {}", status.label(), job.input_path.display())),
        })
        .collect()
}

fn print_summary(summary: &BatchSummary, jobs: &[Job]) {
    for line in unfinished_lines(summary, jobs) {
        eprintln!("{}", line);
    }

    eprintln!(
        "{} converted, {} failed{} ({:.1}s)",
        summary.completed,
        summary.failed,
        if summary.cancelled {
            format!(", {} not converted", summary.not_started())
        } else {
            String::new()
        },
        summary.elapsed.as_secs_f64()
    );
}
