//! Batch conversion engine
//!
//! One worker thread runs a batch strictly in list order:
//! 1. Open source stream
//! 2. Resolve effective rate / depth, open destination stream
//! 3. Stream blocks directly, or decode fully and pull resampled blocks
//! 4. Finalize, report, move to the next job
//!
//! The controller talks to the worker through three things only: a one-shot
//! handoff of the batch snapshot, a FIFO event channel and an atomic
//! cancellation flag.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{AudioBackend, NativeBackend};
use crate::buffer::AudioBuffer;
use crate::config::{ConversionSettings, EngineConfig};
use crate::decoder::{AudioStreamReader, StreamInfo};
use crate::encoder::AudioStreamWriter;
use crate::error::{ConvertError, ConvertResult};
use crate::formats::OutputSpec;
use crate::job::{Job, JobStatus};
use crate::progress::{ProgressEvent, ProgressThrottle, file_fraction};
use crate::resampler::BlockResampler;

/// Worker thread name
pub const WORKER_THREAD_NAME: &str = "wf-convert-worker";

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Jobs in the batch
    pub total: usize,
    /// Jobs that reached Done
    pub completed: usize,
    /// Jobs that reached Error
    pub failed: usize,
    /// Batch was cancelled before the last job finished
    pub cancelled: bool,
    /// Job that was converting when the batch was cancelled
    pub interrupted_job: Option<usize>,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl BatchSummary {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Every job Done
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.completed == self.total
    }

    /// Jobs never started
    pub fn not_started(&self) -> usize {
        let touched = self.completed + self.failed + usize::from(self.interrupted_job.is_some());
        self.total.saturating_sub(touched)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot handed to the worker
struct BatchRun {
    jobs: Vec<Job>,
    settings: ConversionSettings,
    events: Sender<ProgressEvent>,
}

struct WorkerHandle {
    thread: JoinHandle<()>,
    done: Receiver<BatchSummary>,
}

/// Clears the running flag when the worker exits, panics included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sequential batch converter with cooperative cancellation
pub struct ConversionEngine {
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handoff: Arc<Mutex<Option<BatchRun>>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl ConversionEngine {
    /// Engine with the hound / flac-bound / rubato backend
    pub fn native(config: EngineConfig) -> Self {
        Self::new(Arc::new(NativeBackend), config)
    }

    /// Engine over an arbitrary backend
    pub fn new(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            handoff: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    /// Start converting `jobs` on the worker thread.
    ///
    /// Every job is reset to Queued. Events arrive on the returned receiver in
    /// emission order; the channel disconnects when the worker is finished.
    pub fn start(&self, jobs: Vec<Job>, settings: ConversionSettings) -> ConvertResult<Receiver<ProgressEvent>> {
        if jobs.is_empty() {
            return Err(ConvertError::EmptyBatch);
        }
        self.config.validate()?;
        settings.validate()?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConvertError::AlreadyRunning);
        }

        // Reap a finished but never joined worker
        if let Some(previous) = self.worker.lock().take() {
            log::debug!("Discarding result of previous batch");
            let _ = previous.thread.join();
        }

        self.cancel.store(false, Ordering::SeqCst);

        let mut jobs = jobs;
        for job in &mut jobs {
            job.reset();
        }

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        *self.handoff.lock() = Some(BatchRun {
            jobs,
            settings,
            events: events_tx,
        });

        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let cancel = Arc::clone(&self.cancel);
        let handoff = Arc::clone(&self.handoff);
        let guard = RunningGuard(Arc::clone(&self.running));

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let Some(run) = handoff.lock().take() else {
                    log::error!("Conversion worker started without a batch");
                    return;
                };

                let summary = run_batch(backend.as_ref(), &config, &cancel, run);
                drop(guard);
                let _ = done_tx.send(summary);
            });

        match spawned {
            Ok(thread) => {
                *self.worker.lock() = Some(WorkerHandle { thread, done: done_rx });
                Ok(events_rx)
            }
            Err(e) => {
                self.handoff.lock().take();
                self.running.store(false, Ordering::SeqCst);
                Err(ConvertError::Io(e))
            }
        }
    }

    /// Request cancellation; safe to call any number of times
    pub fn cancel(&self) {
        if !self.cancel.swap(true, Ordering::SeqCst) {
            log::debug!("Cancellation requested");
        }
    }

    /// Shared cancellation flag
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Worker currently executing a batch
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the worker; `None` if no batch was started
    pub fn join(&self, timeout: Duration) -> ConvertResult<Option<BatchSummary>> {
        let mut slot = self.worker.lock();
        let Some(handle) = slot.take() else {
            return Ok(None);
        };

        match handle.done.recv_timeout(timeout) {
            Ok(summary) => {
                let _ = handle.thread.join();
                Ok(Some(summary))
            }
            Err(RecvTimeoutError::Timeout) => {
                *slot = Some(handle);
                Err(ConvertError::StopTimeout(timeout.as_millis() as u64))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.thread.join();
                Err(ConvertError::WorkerPanicked)
            }
        }
    }

    /// Cancel and wait up to `timeout`
    pub fn stop(&self, timeout: Duration) -> ConvertResult<Option<BatchSummary>> {
        self.cancel();
        self.join(timeout)
    }
}

impl Drop for ConversionEngine {
    fn drop(&mut self) {
        if self.worker.lock().is_none() {
            return;
        }
        if let Err(e) = self.stop(self.config.stop_timeout()) {
            log::error!("Conversion worker shutdown failed: {}", e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WORKER
// ═══════════════════════════════════════════════════════════════════════════════

enum JobOutcome {
    Done,
    Cancelled,
}

struct JobContext<'a> {
    backend: &'a dyn AudioBackend,
    config: &'a EngineConfig,
    settings: &'a ConversionSettings,
    cancel: &'a AtomicBool,
    events: &'a Sender<ProgressEvent>,
    throttle: &'a mut ProgressThrottle,
    index: usize,
    total: usize,
}

impl JobContext<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn report(&mut self, fraction: f32) {
        if self.throttle.should_emit(fraction) {
            emit(self.events, ProgressEvent::block(self.index, fraction, self.total));
        }
    }

    fn discard(&self, path: &Path) {
        if !self.config.delete_partial_output || !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("Removed partial output {}", path.display()),
            Err(e) => log::warn!("Could not remove partial output {}: {}", path.display(), e),
        }
    }
}

fn emit(events: &Sender<ProgressEvent>, event: ProgressEvent) {
    // Nobody listening is not an error for the worker
    let _ = events.send(event);
}

fn run_batch(backend: &dyn AudioBackend, config: &EngineConfig, cancel: &AtomicBool, run: BatchRun) -> BatchSummary {
    let BatchRun {
        mut jobs,
        settings,
        events,
    } = run;

    let total = jobs.len();
    let started = Instant::now();
    let mut summary = BatchSummary::new(total);
    let mut throttle = ProgressThrottle::new(config.progress_steps);

    log::info!("Batch started: {} jobs ({} backend)", total, backend.name());

    for (index, job) in jobs.iter_mut().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            summary.cancelled = true;
            break;
        }

        job.advance(JobStatus::Converting, "");
        emit(&events, ProgressEvent::job_started(index, total));
        throttle.reset();

        let job_started = Instant::now();
        let mut ctx = JobContext {
            backend,
            config,
            settings: &settings,
            cancel,
            events: &events,
            throttle: &mut throttle,
            index,
            total,
        };

        match convert_job(&mut ctx, job) {
            Ok(JobOutcome::Done) => {
                job.advance(JobStatus::Done, "");
                summary.completed += 1;
                emit(&events, ProgressEvent::job_finished(index, total, JobStatus::Done, ""));
                log::info!(
                    "[{}/{}] {} done in {:.2}s",
                    index + 1,
                    total,
                    job.file_name(),
                    job_started.elapsed().as_secs_f64()
                );
            }
            Ok(JobOutcome::Cancelled) => {
                summary.cancelled = true;
                summary.interrupted_job = Some(index);
                log::info!("[{}/{}] {} cancelled", index + 1, total, job.file_name());
                break;
            }
            Err(message) => {
                log::warn!("[{}/{}] {} failed: {}", index + 1, total, job.file_name(), message);
                job.advance(JobStatus::Error, &message);
                summary.failed += 1;
                emit(
                    &events,
                    ProgressEvent::job_finished(index, total, JobStatus::Error, message),
                );
            }
        }
    }

    summary.elapsed = started.elapsed();
    log::info!(
        "Batch finished: {} done, {} failed{} in {:.2}s",
        summary.completed,
        summary.failed,
        if summary.cancelled { ", cancelled" } else { "" },
        summary.elapsed.as_secs_f64()
    );

    summary
}

/// Convert one job; `Err` carries the message shown to the user
fn convert_job(ctx: &mut JobContext<'_>, job: &Job) -> Result<JobOutcome, String> {
    let mut reader = ctx
        .backend
        .open_reader(&job.input_path)
        .map_err(|e| format!("Cannot read: {} ({})", job.file_name(), e))?;

    let info = reader.info().clone();
    let spec = OutputSpec::resolve(ctx.settings, &info);
    let output = job.output_path(&ctx.config.output_extension);

    let mut writer = ctx.backend.open_writer(&output, &spec).map_err(|e| match e {
        ConvertError::UnsupportedFormat(cause) => format!("FLAC writer failed ({})", cause),
        other => format!("Cannot write: {} ({})", output.display(), other),
    })?;

    log::debug!(
        "{}: {} Hz / {} bit -> {} Hz / {} bit, {} ch, {} frames",
        job.file_name(),
        info.sample_rate,
        info.bits_per_sample,
        spec.sample_rate,
        spec.bit_depth,
        spec.channels,
        info.frames
    );

    let streamed = if spec.sample_rate == info.sample_rate {
        stream_direct(ctx, reader.as_mut(), writer.as_mut(), &info)
    } else {
        stream_resampled(ctx, reader.as_mut(), writer.as_mut(), spec.sample_rate)
    };
    drop(reader);

    match streamed {
        Ok(JobOutcome::Done) => match writer.finalize() {
            Ok(()) => Ok(JobOutcome::Done),
            Err(e) => {
                ctx.discard(&output);
                Err(format!("Write error: {}", e))
            }
        },
        Ok(JobOutcome::Cancelled) => {
            drop(writer);
            ctx.discard(&output);
            Ok(JobOutcome::Cancelled)
        }
        Err(message) => {
            drop(writer);
            ctx.discard(&output);
            Err(message)
        }
    }
}

/// Same rate: read → write block by block
fn stream_direct(
    ctx: &mut JobContext<'_>,
    reader: &mut dyn AudioStreamReader,
    writer: &mut dyn AudioStreamWriter,
    info: &StreamInfo,
) -> Result<JobOutcome, String> {
    let total = info.frames;
    let block_size = ctx.config.block_size.max(1) as u64;
    let mut buffer = AudioBuffer::new(info.channels, info.sample_rate);
    let mut position = 0u64;

    while position < total {
        if ctx.cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        let wanted = (total - position).min(block_size) as usize;
        let read = reader
            .read_frames(position, wanted, &mut buffer)
            .map_err(|e| format!("Read error: {}", e))?;
        if read == 0 {
            log::warn!("Source ended at frame {} of {}", position, total);
            break;
        }

        writer
            .write(&buffer, read)
            .map_err(|e| format!("Write error: {}", e))?;

        position += read as u64;
        ctx.report(file_fraction(position, total));
    }

    Ok(JobOutcome::Done)
}

/// Rate change: decode everything, then pull fixed-size resampled blocks
fn stream_resampled(
    ctx: &mut JobContext<'_>,
    reader: &mut dyn AudioStreamReader,
    writer: &mut dyn AudioStreamWriter,
    dest_rate: u32,
) -> Result<JobOutcome, String> {
    if ctx.cancelled() {
        return Ok(JobOutcome::Cancelled);
    }

    let source = reader.read_all().map_err(|e| format!("Read error: {}", e))?;
    let mut resampler = ctx
        .backend
        .create_resampler(&source, dest_rate)
        .map_err(|e| format!("Resample error: {}", e))?;
    drop(source);

    let result = pull_resampled(ctx, resampler.as_mut(), writer);
    resampler.release();
    result
}

fn pull_resampled(
    ctx: &mut JobContext<'_>,
    resampler: &mut dyn BlockResampler,
    writer: &mut dyn AudioStreamWriter,
) -> Result<JobOutcome, String> {
    let total = resampler.output_frames();
    let block_size = ctx.config.block_size.max(1);
    let mut block = AudioBuffer::new(0, 0);

    while resampler.position() < total {
        if ctx.cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        let produced = resampler
            .next_block(&mut block, block_size)
            .map_err(|e| format!("Resample error: {}", e))?;
        if produced == 0 {
            break;
        }

        writer
            .write(&block, produced)
            .map_err(|e| format!("Write error during resample: {}", e))?;

        ctx.report(file_fraction(resampler.position(), total));
    }

    Ok(JobOutcome::Done)
}
