/// Studio configuration.
///
/// Every constant that shapes the canvas, the compression search and the
/// upload policy lives here with its default. A JSON file at
/// `<config_dir>/frame-studio/config.json` overrides any subset of it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raster::compress::CompressionProfile;
use crate::Result;

pub const MB: usize = 1024 * 1024;

/// Top-level configuration structure for the studio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub canvas: CanvasConfig,
    pub compression: CompressionConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
}

impl StudioConfig {
    /// Where the config file is looked up.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("frame-studio").join("config.json"))
    }

    /// Load the config from the default location, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Limits used to derive the canvas from the frame template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub max_width: f64,
    pub max_height: f64,
    pub min_width: f64,
    pub min_height: f64,
    /// Device-resolution multiplier for every rendered surface.
    pub pixel_ratio: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            max_width: 300.0,
            max_height: 400.0,
            min_width: 250.0,
            min_height: 300.0,
            pixel_ratio: 2.0,
        }
    }
}

/// Byte budgets, ceilings and search profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub rendered_budget: usize,
    pub cropped_budget: usize,
    pub original_budget: usize,
    /// Inputs above this are rejected before any processing.
    pub absolute_ceiling: usize,
    /// Selected photos above this are compressed on ingestion.
    pub ingest_threshold: usize,
    /// Selected photos still above this after ingestion are rejected.
    pub ingest_reject: usize,
    /// Longest side of the original-image export.
    pub original_max_dimension: u32,
    /// JPEG quality for the rendered and cropped exports.
    pub render_quality: f64,
    /// JPEG quality for the original-image export.
    pub original_quality: f64,
    pub client: CompressionProfile,
    pub ingest: CompressionProfile,
    pub server: CompressionProfile,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            rendered_budget: 3 * MB,
            cropped_budget: 3 * MB,
            original_budget: 8 * MB,
            absolute_ceiling: 100 * MB,
            ingest_threshold: 20 * MB,
            ingest_reject: 25 * MB,
            original_max_dimension: 4096,
            render_quality: 0.92,
            original_quality: 0.95,
            client: CompressionProfile::client(),
            ingest: CompressionProfile::client().with_max_dimension(3000),
            server: CompressionProfile::server_original(),
        }
    }
}

/// Retry policy, timeouts and where assets go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
    /// Largest general asset the store accepts.
    pub general_limit: usize,
    /// Largest original image the store accepts.
    pub original_limit: usize,
    /// Upload endpoint of a remote asset store; the local store is used when
    /// unset.
    pub endpoint: Option<String>,
    pub delete_endpoint: Option<String>,
    /// Directory for the local asset store.
    pub local_dir: Option<PathBuf>,
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            timeout_secs: 120,
            general_limit: 20 * MB,
            original_limit: 50 * MB,
            endpoint: None,
            delete_endpoint: None,
            local_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the customization database location.
    pub database_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_remaining_defaults() {
        let config = StudioConfig::from_json(
            r#"{ "upload": { "max_attempts": 5 }, "canvas": { "pixel_ratio": 1.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.upload.max_attempts, 5);
        assert_eq!(config.upload.timeout_secs, 120);
        assert_eq!(config.canvas.pixel_ratio, 1.0);
        assert_eq!(config.canvas.max_width, 300.0);
        assert_eq!(config.compression.rendered_budget, 3 * MB);
    }

    #[test]
    fn test_config_survives_a_json_round_trip() {
        let config = StudioConfig::default();
        let restored = StudioConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "compression": { "original_budget": 1024 } }"#).unwrap();

        let config = StudioConfig::load_from(&path).unwrap();
        assert_eq!(config.compression.original_budget, 1024);
    }
}
