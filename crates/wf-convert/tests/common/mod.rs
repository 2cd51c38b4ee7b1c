//! In-memory backend shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use wf_convert::{
    AudioBackend, AudioBuffer, AudioStreamReader, AudioStreamWriter, BlockResampler, ConvertError, ConvertResult,
    Job, OutputSpec, RubatoResampler, StreamInfo,
};

/// Description of a fake source file
#[derive(Debug, Clone)]
pub struct FakeSource {
    pub sample_rate: u32,
    pub bits: u16,
    pub channels: usize,
    pub frames: u64,
    /// Raise the engine's cancel flag when this source is opened
    pub cancel_on_open: bool,
    /// Fail the write that would pass this many frames
    pub fail_write_after: Option<u64>,
    /// Raise the engine's cancel flag after this many blocks were written
    pub cancel_after_blocks: Option<usize>,
}

impl FakeSource {
    pub fn new(sample_rate: u32, bits: u16, frames: u64) -> Self {
        Self {
            sample_rate,
            bits,
            channels: 2,
            frames,
            cancel_on_open: false,
            fail_write_after: None,
            cancel_after_blocks: None,
        }
    }
}

/// What a fake writer received
#[derive(Debug, Clone, Default)]
pub struct WrittenStream {
    pub spec: Option<OutputSpec>,
    pub frames: u64,
    pub blocks: usize,
    pub finalized: bool,
}

/// Backend keyed by file name; anything unknown fails to open
#[derive(Default)]
pub struct FakeBackend {
    sources: Mutex<HashMap<String, FakeSource>>,
    written: Arc<Mutex<HashMap<PathBuf, WrittenStream>>>,
    cancel: Mutex<Option<Arc<AtomicBool>>>,
    resamplers_created: AtomicUsize,
    resamplers_released: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(self, name: &str, source: FakeSource) -> Self {
        self.sources.lock().insert(name.to_string(), source);
        self
    }

    /// Wire the engine's cancel flag for `cancel_on_open` and `cancel_after_blocks` sources
    pub fn attach_cancel(&self, flag: Arc<AtomicBool>) {
        *self.cancel.lock() = Some(flag);
    }

    pub fn written(&self, output: &Path) -> Option<WrittenStream> {
        self.written.lock().get(output).cloned()
    }

    pub fn resamplers_created(&self) -> usize {
        self.resamplers_created.load(Ordering::SeqCst)
    }

    pub fn resamplers_released(&self) -> usize {
        self.resamplers_released.load(Ordering::SeqCst)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl AudioBackend for FakeBackend {
    fn open_reader(&self, path: &Path) -> ConvertResult<Box<dyn AudioStreamReader>> {
        let source = self
            .sources
            .lock()
            .get(&file_name(path))
            .cloned()
            .ok_or_else(|| ConvertError::Read("No such file".to_string()))?;

        if source.cancel_on_open {
            if let Some(flag) = self.cancel.lock().as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }

        Ok(Box::new(FakeReader {
            info: StreamInfo {
                sample_rate: source.sample_rate,
                bits_per_sample: source.bits,
                channels: source.channels,
                frames: source.frames,
                float: source.bits == 32,
            },
        }))
    }

    fn open_writer(&self, path: &Path, spec: &OutputSpec) -> ConvertResult<Box<dyn AudioStreamWriter>> {
        spec.validate()?;
        std::fs::write(path, b"fLaC")?;

        let source = self.sources.lock().get(&file_name(&path.with_extension("wav"))).cloned();
        let fail_after = source.as_ref().and_then(|s| s.fail_write_after);
        let cancel_after = source
            .as_ref()
            .and_then(|s| s.cancel_after_blocks)
            .and_then(|blocks| self.cancel.lock().clone().map(|flag| (blocks, flag)));

        self.written.lock().insert(
            path.to_path_buf(),
            WrittenStream {
                spec: Some(*spec),
                ..Default::default()
            },
        );

        Ok(Box::new(FakeWriter {
            path: path.to_path_buf(),
            channels: spec.channels,
            fail_after,
            cancel_after,
            frames: 0,
            blocks: 0,
            written: Arc::clone(&self.written),
        }))
    }

    fn create_resampler(&self, source: &AudioBuffer, dest_rate: u32) -> ConvertResult<Box<dyn BlockResampler>> {
        let inner = RubatoResampler::new(source, dest_rate)?;
        self.resamplers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingResampler {
            inner,
            released: Arc::clone(&self.resamplers_released),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Ramp signal so every frame is distinct
pub fn ramp_sample(frame: u64, channel: usize) -> f32 {
    ((frame % 1000) as f32 / 1000.0 - 0.5) * if channel % 2 == 0 { 1.0 } else { -1.0 }
}

struct FakeReader {
    info: StreamInfo,
}

impl AudioStreamReader for FakeReader {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_frames(&mut self, start: u64, frames: usize, buffer: &mut AudioBuffer) -> ConvertResult<usize> {
        let n = self.info.frames.saturating_sub(start).min(frames as u64) as usize;
        buffer.sample_rate = self.info.sample_rate;
        buffer.channels = (0..self.info.channels)
            .map(|c| (0..n as u64).map(|i| ramp_sample(start + i, c)).collect())
            .collect();
        Ok(n)
    }
}

/// Rubato resampler that counts `release` calls
struct CountingResampler {
    inner: RubatoResampler,
    released: Arc<AtomicUsize>,
}

impl BlockResampler for CountingResampler {
    fn output_frames(&self) -> u64 {
        self.inner.output_frames()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn next_block(&mut self, out: &mut AudioBuffer, frames: usize) -> ConvertResult<usize> {
        self.inner.next_block(out, frames)
    }

    fn release(&mut self) {
        self.inner.release();
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeWriter {
    path: PathBuf,
    channels: usize,
    fail_after: Option<u64>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
    frames: u64,
    blocks: usize,
    written: Arc<Mutex<HashMap<PathBuf, WrittenStream>>>,
}

impl AudioStreamWriter for FakeWriter {
    fn write(&mut self, buffer: &AudioBuffer, frames: usize) -> ConvertResult<()> {
        if buffer.num_channels() != self.channels {
            return Err(ConvertError::ChannelMismatch {
                expected: self.channels,
                actual: buffer.num_channels(),
            });
        }
        if let Some(limit) = self.fail_after {
            if self.frames + frames as u64 > limit {
                return Err(ConvertError::Write("disk full".to_string()));
            }
        }

        self.frames += frames as u64;
        self.blocks += 1;
        if let Some(stream) = self.written.lock().get_mut(&self.path) {
            stream.frames = self.frames;
            stream.blocks = self.blocks;
        }
        if let Some((limit, flag)) = &self.cancel_after {
            if self.blocks >= *limit {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> ConvertResult<()> {
        if let Some(stream) = self.written.lock().get_mut(&self.path) {
            stream.finalized = true;
        }
        Ok(())
    }
}

/// Create empty placeholder source files so the queue accepts them
pub fn touch_sources(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"RIFF").unwrap();
            path
        })
        .collect()
}

pub fn jobs_for(paths: &[PathBuf]) -> Vec<Job> {
    paths.iter().map(|p| Job::new(p.clone())).collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
