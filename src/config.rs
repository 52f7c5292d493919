//! Configuration for the transformation pipelines.
//!
//! All config structs implement `Default`, and every section is optional in
//! the TOML file thanks to `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resource limits
    pub limits: LimitsConfig,

    /// Variant generation settings
    pub variants: VariantConfig,
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_image_dimension must be positive".to_string(),
            ));
        }
        if self.variants.medium_size == 0 || self.variants.small_size == 0 {
            return Err(ConfigError::Validation(
                "variant sizes must be positive".to_string(),
            ));
        }
        if self.variants.convert_quality > 100 || self.variants.encode_quality > 100 {
            return Err(ConfigError::Validation(
                "quality values must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Remote fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            fetch_timeout_ms: 30000,
        }
    }
}

/// Sizes and qualities for the derived-variant pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Maximum width of the medium variant
    pub medium_size: u32,

    /// Maximum width of the small variant
    pub small_size: u32,

    /// JPEG quality used by the convert-and-resize step
    pub convert_quality: u8,

    /// Quality for the final re-encode of each variant
    pub encode_quality: u8,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            medium_size: 400,
            small_size: 150,
            convert_quality: 40,
            encode_quality: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.limits.max_image_dimension, 10000);
        assert_eq!(config.variants.medium_size, 400);
        assert_eq!(config.variants.small_size, 150);
        assert_eq!(config.variants.convert_quality, 40);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[limits]"));
        assert!(toml.contains("[variants]"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[variants]\nmedium_size = 800\n").unwrap();
        assert_eq!(config.variants.medium_size, 800);
        assert_eq!(config.variants.small_size, 150);
        assert_eq!(config.limits.decode_timeout_ms, 5000);
    }

    #[test]
    fn test_load_from_rejects_zero_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[variants]\nsmall_size = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
