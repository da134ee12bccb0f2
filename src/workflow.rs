use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{CapsyncError, Result};
use crate::session::{MultiEditSession, TagPresence};
use crate::store::{CaptionStore, CaptionStoreFactory};

/// Image extensions recognized when scanning a dataset directory
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "bmp", "gif", "tiff"];

pub struct Workflow {
    config: Config,
    store: Box<dyn CaptionStore>,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let store = CaptionStoreFactory::create_store(&config.caption);
        Self { config, store }
    }

    fn new_session(&self) -> MultiEditSession {
        MultiEditSession::new(self.config.caption.separator.clone())
    }

    /// Gather input files from explicit arguments and/or a directory scan.
    pub fn collect_inputs(
        &self,
        files: Vec<PathBuf>,
        dir: Option<PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let mut inputs = Vec::new();

        for file in files {
            if !file.exists() {
                return Err(CapsyncError::FileNotFound(file.display().to_string()));
            }
            inputs.push(file);
        }

        if let Some(dir) = dir {
            if !dir.is_dir() {
                return Err(CapsyncError::Config(format!(
                    "Not a directory: {}",
                    dir.display()
                )));
            }
            let mut scanned = Vec::new();
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
                    if IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                        scanned.push(entry.path().to_path_buf());
                    }
                }
            }
            scanned.sort();
            info!("Found {} images in {}", scanned.len(), dir.display());
            inputs.extend(scanned);
        }

        if inputs.is_empty() {
            return Err(CapsyncError::Config(
                "No input files given; pass files or --dir".to_string(),
            ));
        }
        Ok(inputs)
    }

    /// Load the captions of all inputs and return the merged tag view.
    pub async fn merged_view(&self, inputs: &[PathBuf]) -> Result<String> {
        let mut session = self.new_session();
        session.load(inputs, self.store.as_ref()).await
    }

    /// Load, apply the edited merged text, and save every caption.
    /// With `dry_run` nothing is written; the would-be captions are returned.
    pub async fn apply_edit(
        &self,
        inputs: &[PathBuf],
        edited: &str,
        dry_run: bool,
    ) -> Result<Vec<(PathBuf, String)>> {
        let mut session = self.new_session();
        let merged = session.load(inputs, self.store.as_ref()).await?;
        info!("Merged view before edit: {}", merged);

        session.edit(edited)?;

        if !dry_run {
            session.save(self.store.as_ref()).await?;
        }
        let captions = session
            .file_captions()
            .into_iter()
            .map(|(path, caption)| (path.to_path_buf(), caption))
            .collect();
        session.clear();
        Ok(captions)
    }

    /// Add a tag to every file that is missing it, then save.
    pub async fn ensure_tag(&self, inputs: &[PathBuf], tag: &str) -> Result<TagPresence> {
        let mut session = self.new_session();
        session.load(inputs, self.store.as_ref()).await?;

        let before = session.presence_of(tag);
        session.ensure_full_presence(tag)?;
        session.save(self.store.as_ref()).await?;
        session.clear();
        Ok(before)
    }

    /// Presence of a tag across the inputs, without modifying anything.
    pub async fn presence_report(&self, inputs: &[PathBuf], tag: &str) -> Result<TagPresence> {
        let mut session = self.new_session();
        session.load(inputs, self.store.as_ref()).await?;
        Ok(session.presence_of(tag))
    }

    /// Tag frequency over a dataset directory, most frequent first.
    /// Unreadable captions are skipped; statistics are best-effort.
    pub async fn dataset_stats(
        &self,
        dir: PathBuf,
        top: Option<usize>,
    ) -> Result<Vec<(String, usize)>> {
        let inputs = self.collect_inputs(Vec::new(), Some(dir))?;
        let separator = self.config.caption.separator.clone();

        let progress = ProgressBar::new(inputs.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut readable = 0usize;
        for input in &inputs {
            match self.store.load(input).await {
                Ok(caption) => {
                    readable += 1;
                    for part in caption.split(&separator) {
                        let tag = part.trim();
                        if !tag.is_empty() {
                            *counts.entry(tag.to_string()).or_insert(0) += 1;
                        }
                    }
                }
                Err(e) => warn!("Skipping {}: {}", input.display(), e),
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        info!(
            "Counted tags in {} of {} files ({} unique tags)",
            readable,
            inputs.len(),
            counts.len()
        );

        let mut frequencies: Vec<(String, usize)> = counts.into_iter().collect();
        frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        frequencies.truncate(top.unwrap_or(self.config.stats.top));
        Ok(frequencies)
    }
}
