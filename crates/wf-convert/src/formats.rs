//! Output format resolution

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConversionSettings, MAX_COMPRESSION_LEVEL, MAX_FLAC_SAMPLE_RATE};
use crate::decoder::StreamInfo;
use crate::error::{ConvertError, ConvertResult};

/// FLAC bit depth ceiling
pub const MAX_OUTPUT_BIT_DEPTH: u8 = 24;

/// FLAC bit depth floor
pub const MIN_OUTPUT_BIT_DEPTH: u8 = 4;

/// FLAC channel limit
pub const MAX_OUTPUT_CHANNELS: usize = 8;

/// Parameters the destination stream is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub sample_rate: u32,
    pub bit_depth: u8,
    pub channels: usize,
    pub compression_level: u8,
}

impl OutputSpec {
    /// Resolve the effective output spec for a source stream
    pub fn resolve(settings: &ConversionSettings, source: &StreamInfo) -> Self {
        Self {
            sample_rate: effective_sample_rate(settings, source.sample_rate),
            bit_depth: effective_bit_depth(settings, source.bits_per_sample),
            channels: source.channels,
            compression_level: settings.compression_level.min(MAX_COMPRESSION_LEVEL),
        }
    }

    /// Check the spec against FLAC stream limits
    pub fn validate(&self) -> ConvertResult<()> {
        if !(MIN_OUTPUT_BIT_DEPTH..=MAX_OUTPUT_BIT_DEPTH).contains(&self.bit_depth) {
            return Err(ConvertError::UnsupportedFormat(format!(
                "bit depth {} unsupported",
                self.bit_depth
            )));
        }
        if self.channels == 0 || self.channels > MAX_OUTPUT_CHANNELS {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} channels unsupported",
                self.channels
            )));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_FLAC_SAMPLE_RATE {
            return Err(ConvertError::UnsupportedFormat(format!(
                "sample rate {} unsupported",
                self.sample_rate
            )));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ConvertError::UnsupportedFormat(format!(
                "compression level {} unsupported",
                self.compression_level
            )));
        }
        Ok(())
    }
}

/// Target rate if requested, otherwise the source rate
pub fn effective_sample_rate(settings: &ConversionSettings, source_rate: u32) -> u32 {
    settings.target_sample_rate.unwrap_or(source_rate)
}

/// Target depth if requested, otherwise the source depth; never above 24
pub fn effective_bit_depth(settings: &ConversionSettings, source_bits: u16) -> u8 {
    let requested = match settings.target_bit_depth {
        Some(depth) => depth.bits() as u16,
        None => source_bits.min(MAX_OUTPUT_BIT_DEPTH as u16),
    };
    requested.min(MAX_OUTPUT_BIT_DEPTH as u16) as u8
}

/// Destination path: same directory and stem, extension replaced
pub fn output_path_for(input: &Path, output_extension: &str) -> PathBuf {
    input.with_extension(output_extension)
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitDepth;

    fn source(rate: u32, bits: u16) -> StreamInfo {
        StreamInfo {
            sample_rate: rate,
            bits_per_sample: bits,
            channels: 2,
            frames: 1000,
            float: bits == 32,
        }
    }

    #[test]
    fn test_keep_original_rate() {
        let settings = ConversionSettings::default();
        for rate in [8000, 22050, 44100, 96000] {
            assert_eq!(effective_sample_rate(&settings, rate), rate);
        }
    }

    #[test]
    fn test_target_rate_overrides() {
        let settings = ConversionSettings {
            target_sample_rate: Some(48_000),
            ..Default::default()
        };
        assert_eq!(effective_sample_rate(&settings, 44_100), 48_000);
    }

    #[test]
    fn test_keep_original_depth_is_capped() {
        let settings = ConversionSettings::default();
        assert_eq!(effective_bit_depth(&settings, 8), 8);
        assert_eq!(effective_bit_depth(&settings, 16), 16);
        assert_eq!(effective_bit_depth(&settings, 24), 24);
        assert_eq!(effective_bit_depth(&settings, 32), 24);
    }

    #[test]
    fn test_requested_depth_wins() {
        let settings = ConversionSettings {
            target_bit_depth: Some(BitDepth::Bits16),
            ..Default::default()
        };
        assert_eq!(effective_bit_depth(&settings, 32), 16);
        assert_eq!(effective_bit_depth(&settings, 8), 16);

        let settings = ConversionSettings {
            target_bit_depth: Some(BitDepth::Bits24),
            ..Default::default()
        };
        assert_eq!(effective_bit_depth(&settings, 16), 24);
    }

    #[test]
    fn test_resolve_and_validate() {
        let spec = OutputSpec::resolve(&ConversionSettings::default(), &source(44100, 32));
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bit_depth, 24);
        assert_eq!(spec.channels, 2);
        assert!(spec.validate().is_ok());

        let bad = OutputSpec { channels: 9, ..spec };
        assert!(bad.validate().is_err());
        let bad = OutputSpec { bit_depth: 32, ..spec };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_output_path() {
        let out = output_path_for(Path::new("/music/take 1.WAV"), "flac");
        assert_eq!(out, PathBuf::from("/music/take 1.flac"));
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("a.wav"), "wav"));
        assert!(has_extension(Path::new("a.WaV"), "wav"));
        assert!(!has_extension(Path::new("a.flac"), "wav"));
        assert!(!has_extension(Path::new("wav"), "wav"));
    }
}
