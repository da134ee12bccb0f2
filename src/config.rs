use crate::error::{CapsyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Default values for caption configuration
fn default_separator() -> String {
    ", ".to_string()
}

fn default_json_key() -> String {
    "caption".to_string()
}

fn default_stats_top() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub caption: CaptionConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Separator between tags (switchable live, e.g. ", " for tag lists
    /// or ". " for sentence-style captions)
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Caption storage format: Txt or Json
    pub format: CaptionFormat,
    /// JSON object key holding the caption text (Json format only)
    #[serde(default = "default_json_key")]
    pub json_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptionFormat {
    /// Txt: plain-text sidecar file next to the image (image.jpg -> image.txt)
    Txt,
    /// Json: JSON sidecar object with the caption under a configurable key
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Number of tags shown in frequency tables
    #[serde(default = "default_stats_top")]
    pub top: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            caption: CaptionConfig {
                separator: default_separator(),
                format: CaptionFormat::Txt,
                json_key: default_json_key(),
            },
            stats: StatsConfig {
                top: default_stats_top(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CapsyncError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| CapsyncError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CapsyncError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CapsyncError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
