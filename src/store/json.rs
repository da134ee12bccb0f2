use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{CapsyncError, Result};
use crate::store::CaptionStore;

/// JSON sidecar captions: `image.jpg` pairs with `image.json`, the caption
/// text stored under a configurable key. Unrelated keys survive saves.
pub struct JsonCaptionStore {
    key: String,
}

impl JsonCaptionStore {
    pub fn new(key: String) -> Self {
        Self { key }
    }

    async fn read_object(&self, path: &Path) -> Result<Map<String, Value>> {
        let content = fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content)?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(CapsyncError::UnsupportedFormat(format!(
                "{}: expected a JSON object",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl CaptionStore for JsonCaptionStore {
    fn caption_path(&self, input: &Path) -> PathBuf {
        if input.extension().is_some_and(|ext| ext == "json") {
            input.to_path_buf()
        } else {
            input.with_extension("json")
        }
    }

    async fn load(&self, input: &Path) -> Result<String> {
        let path = self.caption_path(input);
        if !path.exists() {
            return Err(CapsyncError::FileNotFound(path.display().to_string()));
        }
        let object = self.read_object(&path).await?;
        match object.get(&self.key) {
            Some(Value::String(caption)) => {
                debug!("Loaded caption from {}", path.display());
                Ok(caption.clone())
            }
            Some(_) => Err(CapsyncError::Caption(format!(
                "{}: '{}' entry is not a string",
                path.display(),
                self.key
            ))),
            None => Err(CapsyncError::Caption(format!(
                "{}: no '{}' entry",
                path.display(),
                self.key
            ))),
        }
    }

    async fn save(&self, input: &Path, caption: &str) -> Result<()> {
        let path = self.caption_path(input);
        let mut object = if path.exists() {
            self.read_object(&path).await?
        } else {
            Map::new()
        };
        object.insert(self.key.clone(), Value::String(caption.to_string()));

        let content = serde_json::to_string_pretty(&Value::Object(object))?;
        fs::write(&path, content)
            .await
            .map_err(|e| CapsyncError::Store(format!("{}: {}", path.display(), e)))?;
        debug!("Saved caption to {}", path.display());
        Ok(())
    }
}
