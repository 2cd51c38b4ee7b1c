//! Planar float audio block shared by readers, resamplers and writers

/// Planar audio buffer (one `Vec<f32>` per channel, nominal range -1.0..1.0)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Per-channel samples
    pub channels: Vec<Vec<f32>>,
    /// Sample rate
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create empty buffer
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![Vec::new(); channels],
            sample_rate,
        }
    }

    /// Create zeroed buffer of `frames` frames
    pub fn with_frames(channels: usize, sample_rate: u32, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            sample_rate,
        }
    }

    /// Build from interleaved samples
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let mut buffer = Self::new(channels, sample_rate);
        if channels == 0 {
            return buffer;
        }

        let frames = samples.len() / channels;
        for ch in buffer.channels.iter_mut() {
            ch.reserve(frames);
        }
        for frame in samples.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                buffer.channels[ch].push(sample);
            }
        }
        buffer
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (length of the shortest channel)
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Resize every channel to `frames`, zero-filling new space
    pub fn set_frames(&mut self, frames: usize) {
        for ch in &mut self.channels {
            ch.resize(frames, 0.0);
        }
    }

    /// Interleave the first `frames` frames
    pub fn to_interleaved(&self, frames: usize) -> Vec<f32> {
        let frames = frames.min(self.frames());
        let mut out = Vec::with_capacity(frames * self.num_channels());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Peak level (linear)
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0, f32::max)
    }
}
