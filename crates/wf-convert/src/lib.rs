//! WF-Convert: batch WAV → FLAC conversion engine
//!
//! Sequential batch conversion of uncompressed audio into FLAC:
//! - Streaming decode → encode when the sample rate is kept
//! - Whole-file rate conversion when a target rate is requested
//! - Bit depth resolution with the FLAC 24-bit ceiling
//! - Per-block and per-job progress events over a FIFO channel
//! - Cooperative cancellation between jobs and between blocks
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  JobQueue (controller)                                           │
//! │   add() / clear() / start() / cancel() / poll_events()           │
//! └───────────────┬──────────────────────────────▲───────────────────┘
//!                 │ snapshot (jobs, settings)    │ ProgressEvent (FIFO)
//!                 ▼                              │
//! ┌──────────────────────────────────────────────┴───────────────────┐
//! │  ConversionEngine (worker thread)                                │
//! │                                                                  │
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐              │
//! │  │ Reader   │ → │ Resampler    │ → │ Writer       │  per job     │
//! │  │ (hound)  │   │ (rubato, opt)│   │ (flac-bound) │              │
//! │  └──────────┘   └──────────────┘   └──────────────┘              │
//! │                                                                  │
//! │  [Job1] → [Job2] → [Job3] ... strictly in order, cancel polled   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wf_convert::{ConversionEngine, ConversionSettings, EngineConfig, JobQueue};
//!
//! # fn main() -> wf_convert::ConvertResult<()> {
//! let mut queue = JobQueue::new(ConversionEngine::native(EngineConfig::default()));
//! queue.add(["/music/a.wav", "/music/b.wav"]);
//!
//! let settings = ConversionSettings::from_raw(48_000, 24, 5)?;
//! queue.start(settings);
//! queue.wait(|event, job| println!("{:?} {:?}", job.map(|j| j.file_name()), event));
//! let summary = queue.finish()?;
//! # let _ = summary;
//! # Ok(())
//! # }
//! ```

mod backend;
mod buffer;
mod config;
mod decoder;
mod encoder;
mod engine;
mod error;
mod formats;
mod job;
mod progress;
mod queue;
mod resampler;

pub use backend::*;
pub use buffer::*;
pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use engine::*;
pub use error::*;
pub use formats::*;
pub use job::*;
pub use progress::*;
pub use queue::*;
pub use resampler::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
