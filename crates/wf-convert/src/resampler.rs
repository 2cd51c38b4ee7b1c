//! Sample rate conversion
//!
//! A [`BlockResampler`] takes the complete source buffer up front and serves
//! the converted signal in caller-sized blocks. The output only depends on the
//! source and the ratio, never on the block sizes used to pull it.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::buffer::AudioBuffer;
use crate::error::{ConvertError, ConvertResult};

/// Frames fed to rubato per call
const RENDER_CHUNK: usize = 1024;

/// Output frame count for a conversion: `round(frames * dest / source)`
pub fn resampled_length(frames: u64, source_rate: u32, dest_rate: u32) -> u64 {
    if source_rate == 0 {
        return 0;
    }
    let num = frames as u128 * dest_rate as u128;
    let den = source_rate as u128;
    ((num + den / 2) / den) as u64
}

/// Pull-based resampler over a fully loaded source
pub trait BlockResampler {
    /// Total frames this resampler produces
    fn output_frames(&self) -> u64;

    /// Frames already handed out
    fn position(&self) -> u64;

    /// Fill `out` with up to `frames` frames; returns the count (0 at the end)
    fn next_block(&mut self, out: &mut AudioBuffer, frames: usize) -> ConvertResult<usize>;

    /// Drop all internal state
    fn release(&mut self);
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUBATO RESAMPLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Polynomial resampler using rubato
pub struct RubatoResampler {
    rendered: Vec<Vec<f32>>,
    dest_rate: u32,
    position: usize,
    total: usize,
}

impl RubatoResampler {
    /// Render `source` (at `source.sample_rate`) to `dest_rate`
    pub fn new(source: &AudioBuffer, dest_rate: u32) -> ConvertResult<Self> {
        let source_rate = source.sample_rate;
        let channels = source.num_channels();

        if channels == 0 {
            return Err(ConvertError::Resample("No channels".to_string()));
        }
        if source_rate == 0 || dest_rate == 0 {
            return Err(ConvertError::Resample(format!(
                "Invalid rates: {} -> {}",
                source_rate, dest_rate
            )));
        }

        let frames = source.frames();
        let total = resampled_length(frames as u64, source_rate, dest_rate) as usize;

        let mut resampler = FastFixedIn::<f32>::new(
            dest_rate as f64 / source_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            RENDER_CHUNK,
            channels,
        )
        .map_err(|e| ConvertError::Resample(format!("Failed to create resampler: {}", e)))?;

        let delay = resampler.output_delay();
        let mut rendered: Vec<Vec<f32>> = vec![Vec::with_capacity(total + delay + RENDER_CHUNK * 8); channels];

        let mut pos = 0;
        while pos < frames {
            let end = (pos + RENDER_CHUNK).min(frames);
            let chunk: Vec<&[f32]> = source.channels.iter().map(|ch| &ch[pos..end]).collect();

            let out = if end - pos == RENDER_CHUNK {
                resampler.process(chunk.as_slice(), None)
            } else {
                resampler.process_partial(Some(chunk.as_slice()), None)
            }
            .map_err(|e| ConvertError::Resample(e.to_string()))?;

            append(&mut rendered, out);
            pos = end;
        }

        // Flush the filter tail until the delayed signal is complete
        while rendered[0].len() < total + delay {
            let out = resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| ConvertError::Resample(e.to_string()))?;
            if out.first().is_none_or(|ch| ch.is_empty()) {
                break;
            }
            append(&mut rendered, out);
        }

        for ch in &mut rendered {
            let skip = delay.min(ch.len());
            ch.drain(..skip);
            ch.resize(total, 0.0);
        }

        log::debug!(
            "Resampled {} frames {} Hz -> {} frames {} Hz ({} ch, delay {})",
            frames,
            source_rate,
            total,
            dest_rate,
            channels,
            delay
        );

        Ok(Self {
            rendered,
            dest_rate,
            position: 0,
            total,
        })
    }

    pub fn dest_rate(&self) -> u32 {
        self.dest_rate
    }
}

fn append(rendered: &mut [Vec<f32>], out: Vec<Vec<f32>>) {
    for (dst, src) in rendered.iter_mut().zip(out) {
        dst.extend_from_slice(&src);
    }
}

impl BlockResampler for RubatoResampler {
    fn output_frames(&self) -> u64 {
        self.total as u64
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn next_block(&mut self, out: &mut AudioBuffer, frames: usize) -> ConvertResult<usize> {
        let n = frames.min(self.total.saturating_sub(self.position));
        out.sample_rate = self.dest_rate;
        out.channels.resize(self.rendered.len(), Vec::new());

        for (dst, src) in out.channels.iter_mut().zip(&self.rendered) {
            dst.clear();
            if n > 0 {
                dst.extend_from_slice(&src[self.position..self.position + n]);
            }
        }

        self.position += n;
        Ok(n)
    }

    fn release(&mut self) {
        self.rendered = Vec::new();
        self.position = 0;
        self.total = 0;
    }
}
