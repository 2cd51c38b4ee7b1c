//! Codec capability bundle
//!
//! The engine never touches a concrete codec. Everything it needs from the
//! outside world goes through [`AudioBackend`], so the control flow can be
//! driven by in-memory fakes.

use std::path::Path;

use crate::buffer::AudioBuffer;
use crate::decoder::{AudioStreamReader, WavStreamReader};
use crate::encoder::AudioStreamWriter;
use crate::error::ConvertResult;
use crate::formats::OutputSpec;
use crate::resampler::{BlockResampler, RubatoResampler};

/// Reader / writer / resampler provider
pub trait AudioBackend: Send + Sync {
    /// Open a source stream
    fn open_reader(&self, path: &Path) -> ConvertResult<Box<dyn AudioStreamReader>>;

    /// Create (or overwrite) a destination stream
    fn open_writer(&self, path: &Path, spec: &OutputSpec) -> ConvertResult<Box<dyn AudioStreamWriter>>;

    /// Build a resampler over a fully decoded source
    fn create_resampler(&self, source: &AudioBuffer, dest_rate: u32) -> ConvertResult<Box<dyn BlockResampler>> {
        Ok(Box::new(RubatoResampler::new(source, dest_rate)?))
    }

    /// Short name for logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// hound reader + flac-bound writer + rubato resampler
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl AudioBackend for NativeBackend {
    fn open_reader(&self, path: &Path) -> ConvertResult<Box<dyn AudioStreamReader>> {
        Ok(Box::new(WavStreamReader::open(path)?))
    }

    #[cfg(feature = "flac")]
    fn open_writer(&self, path: &Path, spec: &OutputSpec) -> ConvertResult<Box<dyn AudioStreamWriter>> {
        Ok(Box::new(crate::encoder::FlacStreamWriter::create(path, spec)?))
    }

    #[cfg(not(feature = "flac"))]
    fn open_writer(&self, _path: &Path, _spec: &OutputSpec) -> ConvertResult<Box<dyn AudioStreamWriter>> {
        Err(crate::error::ConvertError::UnsupportedFormat(
            "FLAC encoding not compiled in (enable the `flac` feature)".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
