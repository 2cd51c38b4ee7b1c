//! Configuration types for batch conversion

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};

/// Sample rates offered by the settings surface (0 = keep original)
pub const SAMPLE_RATE_CHOICES: [u32; 6] = [0, 44_100, 48_000, 88_200, 96_000, 192_000];

/// Bit depths offered by the settings surface (0 = keep original)
pub const BIT_DEPTH_CHOICES: [u8; 3] = [0, 16, 24];

/// Highest FLAC compression level
pub const MAX_COMPRESSION_LEVEL: u8 = 8;

/// Default FLAC compression level
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 5;

/// Highest sample rate a FLAC stream can describe
pub const MAX_FLAC_SAMPLE_RATE: u32 = 655_350;

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSION SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Requested output bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Bits16,
    Bits24,
}

impl BitDepth {
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits24 => 24,
        }
    }

    /// Parse raw bit count; `None` for anything but 16 or 24
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            16 => Some(Self::Bits16),
            24 => Some(Self::Bits24),
            _ => None,
        }
    }
}

/// Settings snapshot captured once per batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// Output sample rate (None = keep original)
    pub target_sample_rate: Option<u32>,

    /// Output bit depth (None = keep original, capped at 24)
    pub target_bit_depth: Option<BitDepth>,

    /// FLAC compression level (0-8, higher = smaller file, slower)
    pub compression_level: u8,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            target_sample_rate: None,
            target_bit_depth: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ConversionSettings {
    /// Build settings from raw surface values where 0 means "keep original"
    pub fn from_raw(sample_rate: u32, bit_depth: u8, compression_level: u8) -> ConvertResult<Self> {
        let target_bit_depth = match bit_depth {
            0 => None,
            bits => Some(BitDepth::from_bits(bits).ok_or_else(|| {
                ConvertError::InvalidSettings(format!("Unsupported bit depth: {}", bits))
            })?),
        };

        let settings = Self {
            target_sample_rate: (sample_rate > 0).then_some(sample_rate),
            target_bit_depth,
            compression_level,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Map 1-based selection ids to settings.
    ///
    /// Rate ids 1..=6 select from [`SAMPLE_RATE_CHOICES`], depth ids 1..=3 from
    /// [`BIT_DEPTH_CHOICES`]; any other id falls back to "keep original".
    /// The compression level is clamped into 0..=8.
    pub fn from_selection(sample_rate_id: usize, bit_depth_id: usize, compression_level: u8) -> Self {
        let sample_rate = sample_rate_id
            .checked_sub(1)
            .and_then(|i| SAMPLE_RATE_CHOICES.get(i))
            .copied()
            .unwrap_or(0);

        let bit_depth = bit_depth_id
            .checked_sub(1)
            .and_then(|i| BIT_DEPTH_CHOICES.get(i))
            .copied()
            .unwrap_or(0);

        Self {
            target_sample_rate: (sample_rate > 0).then_some(sample_rate),
            target_bit_depth: BitDepth::from_bits(bit_depth),
            compression_level: compression_level.min(MAX_COMPRESSION_LEVEL),
        }
    }

    /// Validate ranges
    pub fn validate(&self) -> ConvertResult<()> {
        if let Some(rate) = self.target_sample_rate {
            if rate == 0 || rate > MAX_FLAC_SAMPLE_RATE {
                return Err(ConvertError::InvalidSettings(format!(
                    "Sample rate out of range: {}",
                    rate
                )));
            }
        }

        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ConvertError::InvalidSettings(format!(
                "Compression level must be 0-{}, got {}",
                MAX_COMPRESSION_LEVEL, self.compression_level
            )));
        }

        Ok(())
    }
}

/// Controller-side selection state (1-based ids, as shown in a picker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSelection {
    pub sample_rate_id: usize,
    pub bit_depth_id: usize,
    pub compression_level: u8,
}

impl Default for SettingsSelection {
    fn default() -> Self {
        Self {
            sample_rate_id: 1,
            bit_depth_id: 1,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per read/resample/write block
    pub block_size: usize,

    /// Intra-file progress resolution (200 = one event per 0.5%)
    pub progress_steps: u32,

    /// Bounded wait when stopping the worker
    pub stop_timeout_ms: u64,

    /// Accepted source extension (case-insensitive)
    pub source_extension: String,

    /// Destination extension
    pub output_extension: String,

    /// Remove the destination file of a cancelled or failed job
    pub delete_partial_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: 8192,
            progress_steps: 200,
            stop_timeout_ms: 4000,
            source_extension: "wav".to_string(),
            output_extension: "flac".to_string(),
            delete_partial_output: true,
        }
    }
}

impl EngineConfig {
    /// Set block size (frames)
    pub fn with_block_size(mut self, frames: usize) -> Self {
        self.block_size = frames.max(1);
        self
    }

    /// Set progress resolution
    pub fn with_progress_steps(mut self, steps: u32) -> Self {
        self.progress_steps = steps.max(1);
        self
    }

    /// Set stop timeout
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Keep or remove partial destination files
    pub fn with_delete_partial_output(mut self, delete: bool) -> Self {
        self.delete_partial_output = delete;
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> ConvertResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> ConvertResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> ConvertResult<()> {
        if self.block_size == 0 {
            return Err(ConvertError::InvalidSettings("block_size must be > 0".into()));
        }
        if self.progress_steps == 0 {
            return Err(ConvertError::InvalidSettings("progress_steps must be > 0".into()));
        }
        if self.source_extension.is_empty() || self.output_extension.is_empty() {
            return Err(ConvertError::InvalidSettings("extensions must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_keep() {
        let s = ConversionSettings::from_raw(0, 0, 5).unwrap();
        assert_eq!(s.target_sample_rate, None);
        assert_eq!(s.target_bit_depth, None);
        assert_eq!(s.compression_level, 5);
    }

    #[test]
    fn test_from_raw_rejects_bad_values() {
        assert!(ConversionSettings::from_raw(48_000, 20, 5).is_err());
        assert!(ConversionSettings::from_raw(48_000, 16, 9).is_err());
        assert!(ConversionSettings::from_raw(700_000, 16, 5).is_err());
    }

    #[test]
    fn test_from_selection_mapping() {
        let s = ConversionSettings::from_selection(3, 2, 8);
        assert_eq!(s.target_sample_rate, Some(48_000));
        assert_eq!(s.target_bit_depth, Some(BitDepth::Bits16));

        let s = ConversionSettings::from_selection(6, 3, 0);
        assert_eq!(s.target_sample_rate, Some(192_000));
        assert_eq!(s.target_bit_depth, Some(BitDepth::Bits24));

        let s = ConversionSettings::from_selection(1, 1, 5);
        assert_eq!(s, ConversionSettings::default());
    }

    #[test]
    fn test_from_selection_out_of_range_keeps_original() {
        let s = ConversionSettings::from_selection(0, 7, 42);
        assert_eq!(s.target_sample_rate, None);
        assert_eq!(s.target_bit_depth, None);
        assert_eq!(s.compression_level, MAX_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_engine_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let config = EngineConfig::default()
            .with_block_size(4096)
            .with_delete_partial_output(false);
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_engine_config_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "block_size": 1024 }"#).unwrap();
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.progress_steps, 200);
        assert_eq!(config.output_extension, "flac");
    }
}
