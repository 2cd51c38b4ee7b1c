//! Job queue (controller side)
//!
//! Owns the job list and aggregate progress, hands snapshots to the
//! [`ConversionEngine`] and folds its events back in arrival order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, TryRecvError};
use walkdir::WalkDir;

use crate::config::{ConversionSettings, SettingsSelection};
use crate::engine::{BatchSummary, ConversionEngine};
use crate::error::{ConvertError, ConvertResult};
use crate::formats::has_extension;
use crate::job::Job;
use crate::progress::ProgressEvent;

/// Batch controller
pub struct JobQueue {
    engine: ConversionEngine,
    jobs: Vec<Job>,
    /// Resolved paths already queued
    keys: HashSet<PathBuf>,
    events: Option<Receiver<ProgressEvent>>,
    file_progress: f32,
    overall_progress: f32,
    current_job: Option<usize>,
    last_summary: Option<BatchSummary>,
}

impl JobQueue {
    pub fn new(engine: ConversionEngine) -> Self {
        Self {
            engine,
            jobs: Vec::new(),
            keys: HashSet::new(),
            events: None,
            file_progress: 0.0,
            overall_progress: 0.0,
            current_job: None,
            last_summary: None,
        }
    }

    /// Queue every path that is an existing source file not already queued.
    ///
    /// Returns the number of jobs added. Does nothing while a batch runs.
    pub fn add<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        if self.is_running() {
            log::debug!("Ignoring add while converting");
            return 0;
        }

        let extension = self.engine.config().source_extension.clone();
        let mut added = 0;

        for path in paths {
            let path = path.as_ref();
            if !has_extension(path, &extension) || !path.is_file() {
                log::trace!("Skipping {}", path.display());
                continue;
            }

            let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if self.keys.insert(key) {
                self.jobs.push(Job::new(path));
                added += 1;
            }
        }

        if added > 0 {
            self.reset_progress();
            log::debug!("Queued {} files ({} total)", added, self.jobs.len());
        }
        added
    }

    /// Queue source files found in `dir` (and below when `recursive`)
    pub fn add_dir(&mut self, dir: &Path, recursive: bool) -> ConvertResult<usize> {
        if !dir.is_dir() {
            return Err(ConvertError::Read(format!("Not a directory: {}", dir.display())));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let files: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        Ok(self.add(files))
    }

    /// Remove every job; refused while running
    pub fn clear(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.jobs.clear();
        self.keys.clear();
        self.reset_progress();
        true
    }

    /// Settings snapshot for the current picker selection
    pub fn build_settings(&self, selection: &SettingsSelection) -> ConversionSettings {
        ConversionSettings::from_selection(
            selection.sample_rate_id,
            selection.bit_depth_id,
            selection.compression_level,
        )
    }

    /// Start converting every queued job; false if empty or already running
    pub fn start(&mut self, settings: ConversionSettings) -> bool {
        if self.jobs.is_empty() || self.is_running() {
            return false;
        }

        for job in &mut self.jobs {
            job.reset();
        }
        self.reset_progress();
        self.last_summary = None;

        match self.engine.start(self.jobs.clone(), settings) {
            Ok(events) => {
                self.events = Some(events);
                true
            }
            Err(e) => {
                log::warn!("Could not start conversion: {}", e);
                false
            }
        }
    }

    /// Ask the worker to stop after the current block
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Apply every event available right now
    pub fn poll_events(&mut self) -> Vec<ProgressEvent> {
        let mut applied = Vec::new();
        let Some(events) = self.events.clone() else {
            return applied;
        };

        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.apply_event(&event);
                    applied.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    break;
                }
            }
        }
        applied
    }

    /// Block until the worker hangs up, applying events as they arrive.
    ///
    /// `on_event` sees each event after it was applied, together with the
    /// job it refers to.
    pub fn wait<F>(&mut self, mut on_event: F)
    where
        F: FnMut(&ProgressEvent, Option<&Job>),
    {
        let Some(events) = self.events.take() else {
            return;
        };

        for event in events.iter() {
            self.apply_event(&event);
            let job = self.current_job.and_then(|i| self.jobs.get(i));
            on_event(&event, job);
        }
    }

    /// Wait for the batch to end and collect its summary
    pub fn finish(&mut self) -> ConvertResult<Option<BatchSummary>> {
        self.wait(|_, _| {});
        let summary = self.engine.join(self.engine.config().stop_timeout())?;
        if summary.is_some() {
            self.last_summary.clone_from(&summary);
        }
        Ok(summary)
    }

    /// Fold one event into job state and aggregate progress
    pub fn apply_event(&mut self, event: &ProgressEvent) {
        if let Some(index) = event.job_index {
            if let Some(job) = self.jobs.get_mut(index) {
                job.advance(event.status, &event.error_message);
            }
            self.current_job = Some(index);
        }
        if let Some(fraction) = event.file_progress {
            self.file_progress = fraction;
        }
        if let Some(fraction) = event.overall_progress {
            self.overall_progress = fraction;
        }
    }

    fn reset_progress(&mut self) {
        self.file_progress = 0.0;
        self.overall_progress = 0.0;
        self.current_job = None;
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Batch in flight (worker busy or events not yet drained)
    pub fn is_running(&self) -> bool {
        self.events.is_some() || self.engine.is_running()
    }

    pub fn file_progress(&self) -> f32 {
        self.file_progress
    }

    pub fn overall_progress(&self) -> f32 {
        self.overall_progress
    }

    /// Job named by the most recent boundary event
    pub fn current_job(&self) -> Option<&Job> {
        self.current_job.and_then(|i| self.jobs.get(i))
    }

    pub fn last_summary(&self) -> Option<&BatchSummary> {
        self.last_summary.as_ref()
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }
}
