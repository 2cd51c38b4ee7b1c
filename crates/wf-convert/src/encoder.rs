//! Audio encoding module
//!
//! Destination side of the conversion pipeline:
//! - FLAC (via flac-bound): streaming, block by block
//!
//! Float samples are quantized to the effective output bit depth with
//! rounding and clamping; no dither is applied.

use crate::buffer::AudioBuffer;
use crate::error::ConvertResult;
#[cfg(feature = "flac")]
use crate::error::ConvertError;
use crate::formats::OutputSpec;

use std::path::Path;
#[cfg(feature = "flac")]
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Writable audio stream
pub trait AudioStreamWriter {
    /// Encode the first `frames` frames of `buffer`
    fn write(&mut self, buffer: &AudioBuffer, frames: usize) -> ConvertResult<()>;

    /// Flush and close the stream
    fn finalize(self: Box<Self>) -> ConvertResult<()>;
}

/// Quantize a float sample to a signed integer of `bits` bits
pub fn quantize(sample: f32, bits: u8) -> i32 {
    let scale = (1i64 << (bits - 1)) as f64;
    (sample as f64 * scale).round().clamp(-scale, scale - 1.0) as i32
}

/// Interleave and quantize `frames` frames into `out`
pub fn quantize_interleaved(buffer: &AudioBuffer, frames: usize, bits: u8, out: &mut Vec<i32>) {
    let frames = frames.min(buffer.frames());
    out.clear();
    out.reserve(frames * buffer.num_channels());
    for i in 0..frames {
        for ch in &buffer.channels {
            out.push(quantize(ch[i], bits));
        }
    }
}

/// Remove the file at `path` if `result` is an error
#[cfg_attr(not(feature = "flac"), allow(dead_code))]
fn discard_on_error<T>(path: &Path, result: ConvertResult<T>) -> ConvertResult<T> {
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLAC WRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Streaming FLAC writer using flac-bound
#[cfg(feature = "flac")]
pub struct FlacStreamWriter {
    encoder: flac_bound::FlacEncoder<'static>,
    spec: OutputSpec,
    path: PathBuf,
    scratch: Vec<i32>,
    frames_written: u64,
}

#[cfg(feature = "flac")]
impl FlacStreamWriter {
    /// Create (or truncate) `path` and initialize the encoder
    pub fn create(path: &Path, spec: &OutputSpec) -> ConvertResult<Self> {
        spec.validate()?;

        // Surface permission problems before libFLAC hides them behind a status code
        std::fs::File::create(path)
            .map_err(|e| ConvertError::Write(format!("{}: {}", path.display(), e)))?;

        let encoder = discard_on_error(
            path,
            flac_bound::FlacEncoder::new()
                .ok_or_else(|| ConvertError::Write("FLAC encoder init failed".to_string()))
                .and_then(|builder| {
                    builder
                        .channels(spec.channels as u32)
                        .bits_per_sample(spec.bit_depth as u32)
                        .sample_rate(spec.sample_rate)
                        .compression_level(spec.compression_level as u32)
                        .init_file(&path)
                        .map_err(|e| ConvertError::Write(format!("FLAC init failed: {:?}", e)))
                }),
        )?;

        log::debug!(
            "FLAC writer {}: {} Hz, {} bit, {} ch, level {}",
            path.display(),
            spec.sample_rate,
            spec.bit_depth,
            spec.channels,
            spec.compression_level
        );

        Ok(Self {
            encoder,
            spec: *spec,
            path: path.to_path_buf(),
            scratch: Vec::new(),
            frames_written: 0,
        })
    }
}

#[cfg(feature = "flac")]
impl AudioStreamWriter for FlacStreamWriter {
    fn write(&mut self, buffer: &AudioBuffer, frames: usize) -> ConvertResult<()> {
        if buffer.num_channels() != self.spec.channels {
            return Err(ConvertError::ChannelMismatch {
                expected: self.spec.channels,
                actual: buffer.num_channels(),
            });
        }

        let frames = frames.min(buffer.frames());
        if frames == 0 {
            return Ok(());
        }

        quantize_interleaved(buffer, frames, self.spec.bit_depth, &mut self.scratch);

        self.encoder
            .process_interleaved(&self.scratch, frames as u32)
            .map_err(|_| {
                ConvertError::Write(format!(
                    "FLAC process failed at frame {} of {}",
                    self.frames_written,
                    self.path.display()
                ))
            })?;

        self.frames_written += frames as u64;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> ConvertResult<()> {
        let path = self.path.clone();
        let frames = self.frames_written;

        self.encoder
            .finish()
            .map_err(|_| ConvertError::Write(format!("FLAC finish failed: {}", path.display())))?;

        log::debug!("FLAC writer {}: {} frames", path.display(), frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_16_bit() {
        assert_eq!(quantize(0.0, 16), 0);
        assert_eq!(quantize(0.5, 16), 16384);
        assert_eq!(quantize(-1.0, 16), -32768);
        // Full scale positive clamps to the largest code
        assert_eq!(quantize(1.0, 16), 32767);
        assert_eq!(quantize(3.0, 16), 32767);
    }

    #[test]
    fn test_quantize_24_bit() {
        assert_eq!(quantize(1.0, 24), 8_388_607);
        assert_eq!(quantize(-2.0, 24), -8_388_608);
        assert_eq!(quantize(1.0 / 8_388_608.0, 24), 1);
    }

    #[test]
    fn test_quantize_inverts_integer_normalization() {
        for code in [-32768i32, -1234, -1, 0, 1, 777, 32767] {
            let sample = (code as f64 / 32768.0) as f32;
            assert_eq!(quantize(sample, 16), code);
        }
    }

    #[test]
    fn test_quantize_interleaved() {
        let buffer = AudioBuffer::from_interleaved(&[0.5, -0.5, 0.25, -0.25], 2, 44100);
        let mut out = Vec::new();
        quantize_interleaved(&buffer, 2, 16, &mut out);
        assert_eq!(out, vec![16384, -16384, 8192, -8192]);

        quantize_interleaved(&buffer, 1, 16, &mut out);
        assert_eq!(out, vec![16384, -16384]);
    }

    #[test]
    fn test_failed_init_discards_created_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("take.flac");
        std::fs::write(&path, b"").unwrap();

        let result: ConvertResult<()> = Err(crate::error::ConvertError::Write("FLAC init failed".to_string()));
        assert!(discard_on_error(&path, result).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_successful_init_keeps_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("take.flac");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(discard_on_error(&path, Ok(7)).unwrap(), 7);
        assert!(path.exists());
    }
}
