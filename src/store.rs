use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::PipelineError;

pub const OUTPUT_PREFIX: &str = "icf_";
pub const OUTPUT_EXTENSION: &str = ".docx";

/// Scratch directory for rendered documents awaiting download.
///
/// Files are addressed by an opaque token (their generated file name) and are
/// evicted once older than `ttl`; every save sweeps expired files first.
#[derive(Clone, Debug)]
pub struct OutputStore {
    dir: PathBuf,
    ttl: Duration,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, bytes: &[u8]) -> Result<String, PipelineError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        if let Err(err) = self.sweep_expired().await {
            warn!("output sweep failed: {err:#}");
        }

        let token = format!("{OUTPUT_PREFIX}{}{OUTPUT_EXTENSION}", Uuid::new_v4().simple());
        tokio::fs::write(self.dir.join(&token), bytes).await?;
        info!(%token, bytes = bytes.len(), "stored generated document");
        Ok(token)
    }

    pub async fn load(&self, token: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.resolve(token)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::OutputNotFound(token.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Maps a token to its path, refusing anything that is not a name this
    /// store could have generated.
    pub fn resolve(&self, token: &str) -> Result<PathBuf, PipelineError> {
        if !is_valid_token(token) {
            return Err(PipelineError::InvalidReference(token.to_string()));
        }
        Ok(self.dir.join(token))
    }

    /// Deletes stored documents older than the configured lifetime and
    /// returns how many were removed.
    pub async fn sweep_expired(&self) -> anyhow::Result<usize> {
        let dir = self.dir.clone();
        let ttl = self.ttl;

        let removed = tokio::task::spawn_blocking(move || {
            let now = SystemTime::now();
            let mut removed = 0usize;

            for entry in WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| entry.file_name().to_str().is_some_and(is_valid_token))
            {
                let expired = entry
                    .metadata()
                    .ok()
                    .and_then(|meta| meta.modified().ok())
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > ttl);

                if expired && std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }

            removed
        })
        .await
        .context("output sweep task panicked")?;

        if removed > 0 {
            debug!(removed, "evicted expired documents");
        }
        Ok(removed)
    }
}

fn is_valid_token(token: &str) -> bool {
    let Some(stem) = token
        .strip_prefix(OUTPUT_PREFIX)
        .and_then(|rest| rest.strip_suffix(OUTPUT_EXTENSION))
    else {
        return false;
    };

    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
