//! Conversion job definitions

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::formats::output_path_for;

/// Job execution status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting in queue
    #[default]
    Queued,
    /// Currently converting
    Converting,
    /// Completed successfully
    Done,
    /// Failed with error
    Error,
}

impl JobStatus {
    /// Done or Error
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether `next` is a legal forward step from `self`
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (Self::Queued, Self::Converting) => true,
            (Self::Queued, Self::Error) => true,
            (Self::Converting, Self::Done | Self::Error) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Converting => "Converting",
            Self::Done => "Done",
            Self::Error => "Error",
        }
    }
}

/// One source file → one FLAC file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Source file
    pub input_path: PathBuf,
    /// Current status
    pub status: JobStatus,
    /// Set only when status is Error
    pub error_message: String,
}

impl Job {
    pub fn new<P: Into<PathBuf>>(input_path: P) -> Self {
        Self {
            input_path: input_path.into(),
            status: JobStatus::Queued,
            error_message: String::new(),
        }
    }

    /// Destination path for a given output extension
    pub fn output_path(&self, extension: &str) -> PathBuf {
        output_path_for(&self.input_path, extension)
    }

    /// File name for display and logs
    pub fn file_name(&self) -> String {
        display_name(&self.input_path)
    }

    /// Back to Queued for a fresh run
    pub fn reset(&mut self) {
        self.status = JobStatus::Queued;
        self.error_message.clear();
    }

    /// Apply a status update, ignoring backwards transitions
    pub fn advance(&mut self, status: JobStatus, error_message: &str) -> bool {
        if !self.status.can_advance_to(status) {
            log::warn!(
                "{}: ignoring status change {:?} -> {:?}",
                self.file_name(),
                self.status,
                status
            );
            return false;
        }

        self.status = status;
        if status == JobStatus::Error {
            self.error_message = error_message.to_string();
        } else {
            self.error_message.clear();
        }
        true
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
