//! Audio decoding module
//!
//! Source side of the conversion pipeline. Readers expose stream properties
//! and random-access frame reads into planar float blocks.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::buffer::AudioBuffer;
use crate::error::{ConvertError, ConvertResult};

// ═══════════════════════════════════════════════════════════════════════════════
// READER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source stream properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: usize,
    pub frames: u64,
    /// True for IEEE float sources
    pub float: bool,
}

impl StreamInfo {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f64 / self.sample_rate as f64
        }
    }
}

/// Readable audio stream
pub trait AudioStreamReader {
    /// Stream properties
    fn info(&self) -> &StreamInfo;

    /// Read up to `frames` frames starting at frame `start` into `buffer`.
    ///
    /// The buffer is resized to the number of frames actually read, which is
    /// returned. Reads past the end yield fewer frames (zero at the end).
    fn read_frames(&mut self, start: u64, frames: usize, buffer: &mut AudioBuffer) -> ConvertResult<usize>;

    /// Decode the whole stream into memory
    fn read_all(&mut self) -> ConvertResult<AudioBuffer> {
        let info = self.info().clone();
        let frames = usize::try_from(info.frames)
            .map_err(|_| ConvertError::Read(format!("File too large: {} frames", info.frames)))?;

        let mut buffer = AudioBuffer::new(info.channels, info.sample_rate);
        let read = self.read_frames(0, frames, &mut buffer)?;
        buffer.set_frames(read);
        Ok(buffer)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV READER
// ═══════════════════════════════════════════════════════════════════════════════

/// Streaming WAV reader using hound
pub struct WavStreamReader {
    reader: hound::WavReader<BufReader<File>>,
    info: StreamInfo,
    path: PathBuf,
    /// Next frame the underlying reader will yield
    position: u64,
}

impl WavStreamReader {
    /// Open WAV file and read its header
    pub fn open(path: &Path) -> ConvertResult<Self> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| ConvertError::Read(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(ConvertError::Read(format!("{}: no channels", path.display())));
        }

        let info = StreamInfo {
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels as usize,
            frames: reader.duration() as u64,
            float: spec.sample_format == hound::SampleFormat::Float,
        };

        log::debug!(
            "Opened {}: {} Hz, {} bit, {} ch, {} frames",
            path.display(),
            info.sample_rate,
            info.bits_per_sample,
            info.channels,
            info.frames
        );

        Ok(Self {
            reader,
            info,
            path: path.to_path_buf(),
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&mut self, frame: u64) -> ConvertResult<()> {
        if frame == self.position {
            return Ok(());
        }
        let target = u32::try_from(frame)
            .map_err(|_| ConvertError::Read(format!("Seek out of range: {}", frame)))?;
        self.reader.seek(target)?;
        self.position = frame;
        Ok(())
    }
}

impl AudioStreamReader for WavStreamReader {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_frames(&mut self, start: u64, frames: usize, buffer: &mut AudioBuffer) -> ConvertResult<usize> {
        let channels = self.info.channels;
        let available = self.info.frames.saturating_sub(start).min(frames as u64) as usize;

        buffer.sample_rate = self.info.sample_rate;
        buffer.channels.resize(channels, Vec::new());
        for ch in &mut buffer.channels {
            ch.clear();
            ch.reserve(available);
        }

        if available == 0 {
            return Ok(0);
        }

        self.seek_to(start)?;

        let wanted = available * channels;
        let mut count = 0usize;

        if self.info.float {
            for sample in self.reader.samples::<f32>().take(wanted) {
                let sample = sample.map_err(|e| ConvertError::Read(e.to_string()))?;
                buffer.channels[count % channels].push(sample);
                count += 1;
            }
        } else {
            let scale = 1.0 / (1i64 << (self.info.bits_per_sample - 1)) as f64;
            for sample in self.reader.samples::<i32>().take(wanted) {
                let sample = sample.map_err(|e| ConvertError::Read(e.to_string()))?;
                buffer.channels[count % channels].push((sample as f64 * scale) as f32);
                count += 1;
            }
        }

        // Truncated data chunk: keep complete frames only
        let read = count / channels;
        buffer.set_frames(read);
        self.position = start + read as u64;

        if read < available {
            log::warn!(
                "{}: expected {} frames at {}, got {}",
                self.path.display(),
                available,
                start,
                read
            );
        }

        Ok(read)
    }
}
