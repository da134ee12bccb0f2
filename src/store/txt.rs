use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{CapsyncError, Result};
use crate::store::CaptionStore;

/// Plain-text sidecar captions: `image.jpg` pairs with `image.txt`.
pub struct TxtCaptionStore;

impl TxtCaptionStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TxtCaptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionStore for TxtCaptionStore {
    fn caption_path(&self, input: &Path) -> PathBuf {
        if input.extension().is_some_and(|ext| ext == "txt") {
            input.to_path_buf()
        } else {
            input.with_extension("txt")
        }
    }

    async fn load(&self, input: &Path) -> Result<String> {
        let path = self.caption_path(input);
        if !path.exists() {
            return Err(CapsyncError::FileNotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(&path).await?;
        debug!("Loaded caption from {}", path.display());
        // Editors commonly leave a trailing newline behind
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn save(&self, input: &Path, caption: &str) -> Result<()> {
        let path = self.caption_path(input);
        fs::write(&path, caption)
            .await
            .map_err(|e| CapsyncError::Store(format!("{}: {}", path.display(), e)))?;
        debug!("Saved caption to {}", path.display());
        Ok(())
    }
}
