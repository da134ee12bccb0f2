// Caption storage backends
//
// This module abstracts where caption text lives on disk:
// - Txt: plain-text sidecar files next to the images
// - Json: JSON sidecar objects with the caption under a configurable key

pub mod json;
pub mod txt;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use json::JsonCaptionStore;
pub use txt::TxtCaptionStore;

use crate::config::{CaptionConfig, CaptionFormat};
use crate::error::Result;

/// Main trait for caption load/save operations
#[async_trait]
pub trait CaptionStore: Send + Sync {
    /// Resolve the caption file belonging to an input path
    fn caption_path(&self, input: &Path) -> PathBuf;

    /// Read the caption for an input path. Missing captions are an error;
    /// session loads are all-or-nothing.
    async fn load(&self, input: &Path) -> Result<String>;

    /// Write the caption for an input path
    async fn save(&self, input: &Path, caption: &str) -> Result<()>;
}

/// Factory for creating caption store instances
pub struct CaptionStoreFactory;

impl CaptionStoreFactory {
    /// Create a caption store matching the configured format
    pub fn create_store(config: &CaptionConfig) -> Box<dyn CaptionStore> {
        match config.format {
            CaptionFormat::Txt => Box::new(TxtCaptionStore::new()),
            CaptionFormat::Json => Box::new(JsonCaptionStore::new(config.json_key.clone())),
        }
    }
}
