//! Progress reporting
//!
//! Events flow from the worker to the controller in emission order. Boundary
//! events (job start / job end) always carry a job index; per-block events
//! only update the current file and overall fractions.

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job this status applies to (None = file-only update)
    pub job_index: Option<usize>,
    /// Current file progress 0.0-1.0 (None = unchanged)
    pub file_progress: Option<f32>,
    /// Whole-batch progress 0.0-1.0 (None = unchanged)
    pub overall_progress: Option<f32>,
    /// Status of `job_index`; ignored when no index is set
    pub status: JobStatus,
    /// Non-empty only with `JobStatus::Error`
    pub error_message: String,
}

impl ProgressEvent {
    /// Job `index` of `total` entered Converting
    pub fn job_started(index: usize, total: usize) -> Self {
        Self {
            job_index: Some(index),
            file_progress: Some(0.0),
            overall_progress: Some(overall_progress(index, 0.0, total)),
            status: JobStatus::Converting,
            error_message: String::new(),
        }
    }

    /// Intra-file update
    pub fn block(index: usize, file_fraction: f32, total: usize) -> Self {
        Self {
            job_index: None,
            file_progress: Some(file_fraction),
            overall_progress: Some(overall_progress(index, file_fraction, total)),
            status: JobStatus::Converting,
            error_message: String::new(),
        }
    }

    /// Job `index` reached Done or Error
    pub fn job_finished(index: usize, total: usize, status: JobStatus, error_message: impl Into<String>) -> Self {
        let error_message = if status == JobStatus::Error {
            error_message.into()
        } else {
            String::new()
        };

        Self {
            job_index: Some(index),
            file_progress: Some(1.0),
            overall_progress: Some(overall_progress(index, 1.0, total)),
            status,
            error_message,
        }
    }

    /// Boundary event carrying a job status
    pub fn is_job_update(&self) -> bool {
        self.job_index.is_some()
    }
}

/// `(index + fraction) / total`, 0 for an empty batch
pub fn overall_progress(index: usize, file_fraction: f32, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((index as f32 + file_fraction.clamp(0.0, 1.0)) / total as f32).clamp(0.0, 1.0)
}

/// Limits block events to one per `1/steps` of a file
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    steps: u32,
    last_bucket: u32,
}

impl ProgressThrottle {
    pub fn new(steps: u32) -> Self {
        Self {
            steps: steps.max(1),
            last_bucket: 0,
        }
    }

    /// Start a new file; bucket 0 is covered by the job-start event
    pub fn reset(&mut self) {
        self.last_bucket = 0;
    }

    /// True when `fraction` crossed into a new bucket
    pub fn should_emit(&mut self, fraction: f32) -> bool {
        let bucket = ((fraction.clamp(0.0, 1.0) * self.steps as f32).floor() as u32).min(self.steps);
        if bucket > self.last_bucket {
            self.last_bucket = bucket;
            true
        } else {
            false
        }
    }
}

/// processed / total as a fraction, 1.0 for an empty stream
pub fn file_fraction(processed: u64, total: u64) -> f32 {
    if total == 0 {
        1.0
    } else {
        (processed as f64 / total as f64).min(1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_overall_progress() {
        assert_relative_eq!(overall_progress(0, 0.0, 4), 0.0);
        assert_relative_eq!(overall_progress(1, 0.5, 4), 0.375);
        assert_relative_eq!(overall_progress(3, 1.0, 4), 1.0);
        assert_eq!(overall_progress(0, 0.5, 0), 0.0);
    }

    #[test]
    fn test_boundary_events() {
        let start = ProgressEvent::job_started(2, 5);
        assert_eq!(start.job_index, Some(2));
        assert_eq!(start.status, JobStatus::Converting);
        assert_relative_eq!(start.overall_progress.unwrap(), 0.4);

        let done = ProgressEvent::job_finished(2, 5, JobStatus::Done, "ignored");
        assert_eq!(done.file_progress, Some(1.0));
        assert_relative_eq!(done.overall_progress.unwrap(), 0.6);
        assert!(done.error_message.is_empty());

        let failed = ProgressEvent::job_finished(0, 1, JobStatus::Error, "Cannot read: x.wav");
        assert_eq!(failed.error_message, "Cannot read: x.wav");
    }

    #[test]
    fn test_block_event_has_no_index() {
        let event = ProgressEvent::block(1, 0.5, 2);
        assert!(!event.is_job_update());
        assert_relative_eq!(event.overall_progress.unwrap(), 0.75);
    }

    #[test]
    fn test_throttle_limits_events() {
        let mut throttle = ProgressThrottle::new(200);
        let total = 1_000_000u64;
        let mut emitted = 0;
        let mut processed = 0;
        while processed < total {
            processed = (processed + 777).min(total);
            if throttle.should_emit(file_fraction(processed, total)) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 200);
    }

    #[test]
    fn test_throttle_small_file() {
        let mut throttle = ProgressThrottle::new(200);
        // Single block covering the whole file
        assert!(throttle.should_emit(1.0));
        assert!(!throttle.should_emit(1.0));

        throttle.reset();
        assert!(!throttle.should_emit(0.001));
        assert!(throttle.should_emit(0.006));
    }

    #[test]
    fn test_file_fraction() {
        assert_eq!(file_fraction(0, 0), 1.0);
        assert_eq!(file_fraction(50, 100), 0.5);
        assert_eq!(file_fraction(150, 100), 1.0);
    }
}
