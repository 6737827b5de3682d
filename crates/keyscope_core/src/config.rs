use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DbError;

/// Members requested per backend page.
pub const SCAN_COUNT_DEFAULT: u32 = 500;

/// Which key list the browser was opened from; picks the telemetry event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Browser,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_scan_count")]
    pub scan_count: u32,

    #[serde(default = "default_row_height")]
    pub row_height: f32,

    #[serde(default = "default_header_height")]
    pub header_height: f32,

    #[serde(default = "default_overscan_rows")]
    pub overscan_rows: usize,

    /// Rows before the end of the loaded window at which the next page is requested.
    #[serde(default = "default_load_threshold")]
    pub load_threshold: usize,

    #[serde(default = "default_minimum_batch_size")]
    pub minimum_batch_size: usize,

    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,

    #[serde(default = "default_uri")]
    pub default_uri: String,

    #[serde(default)]
    pub view_type: ViewType,
}

fn default_scan_count() -> u32 {
    SCAN_COUNT_DEFAULT
}

fn default_row_height() -> f32 {
    43.0
}

fn default_header_height() -> f32 {
    60.0
}

fn default_overscan_rows() -> usize {
    2
}

fn default_load_threshold() -> usize {
    15
}

fn default_minimum_batch_size() -> usize {
    10
}

fn default_max_cell_chars() -> usize {
    200
}

fn default_uri() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            scan_count: default_scan_count(),
            row_height: default_row_height(),
            header_height: default_header_height(),
            overscan_rows: default_overscan_rows(),
            load_threshold: default_load_threshold(),
            minimum_batch_size: default_minimum_batch_size(),
            max_cell_chars: default_max_cell_chars(),
            default_uri: default_uri(),
            view_type: ViewType::default(),
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, DbError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DbError::IoError(std::io::Error::other("Could not find config directory"))
        })?;

        let app_dir = config_dir.join("keyscope");
        fs::create_dir_all(&app_dir).map_err(DbError::IoError)?;

        Ok(Self {
            path: app_dir.join("config.json"),
        })
    }

    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<BrowserConfig, DbError> {
        if !self.path.exists() {
            return Ok(BrowserConfig::default());
        }

        let content = fs::read_to_string(&self.path).map_err(DbError::IoError)?;
        let config: BrowserConfig =
            serde_json::from_str(&content).map_err(|e| DbError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn save(&self, config: &BrowserConfig) -> Result<(), DbError> {
        let content =
            serde_json::to_string_pretty(config).map_err(|e| DbError::Config(e.to_string()))?;
        fs::write(&self.path, content).map_err(DbError::IoError)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: BrowserConfig =
            serde_json::from_str(r#"{"scan_count": 50, "view_type": "tree"}"#).expect("parse");

        assert_eq!(config.scan_count, 50);
        assert_eq!(config.view_type, ViewType::Tree);
        assert_eq!(config.row_height, 43.0);
        assert_eq!(config.load_threshold, 15);
    }
}
