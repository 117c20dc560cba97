//! Stored product images.
//!
//! Images are files under a local directory, published under a URL prefix.
//! Cleanup is a batch operation: every delete runs concurrently and each one
//! reports its own outcome.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("url is not served from the asset store")]
    Foreign,
    #[error("file does not exist")]
    Missing,
    #[error("io error: {0}")]
    Io(String),
}

/// Result of deleting one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOutcome {
    pub url: String,
    pub result: Result<(), AssetError>,
}

impl AssetOutcome {
    pub fn is_ok(&self) -> bool { self.result.is_ok() }
}

/// Counts of a cleanup batch, for responses and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub deleted: usize,
    pub failed: usize,
}

impl CleanupSummary {
    pub fn of(outcomes: &[AssetOutcome]) -> Self {
        let deleted = outcomes.iter().filter(|o| o.is_ok()).count();
        Self { deleted, failed: outcomes.len() - deleted }
    }
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    base_url: String,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self { root: root.into(), base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Maps a public URL onto a file under the root. Rejects URLs outside the
    /// prefix and any path that would escape the root.
    pub fn path_for(&self, url: &str) -> Result<PathBuf, AssetError> {
        let relative = url
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(AssetError::Foreign)?;
        let relative = Path::new(relative);
        let clean = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean || relative.as_os_str().is_empty() {
            return Err(AssetError::Foreign);
        }
        Ok(self.root.join(relative))
    }

    pub async fn delete(&self, url: &str) -> Result<(), AssetError> {
        let path = self.path_for(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AssetError::Missing),
            Err(e) => Err(AssetError::Io(e.to_string())),
        }
    }

    /// Deletes every URL concurrently and waits for all of them to settle.
    pub async fn delete_many<I, S>(&self, urls: I) -> Vec<AssetOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deletes = urls.into_iter().map(|url| {
            let url: String = url.into();
            async move {
                let result = self.delete(&url).await;
                AssetOutcome { url, result }
            }
        });
        join_all(deletes).await
    }
}

/// Logs the failed entries of a cleanup batch.
pub fn log_cleanup(context: &str, outcomes: &[AssetOutcome]) {
    for outcome in outcomes {
        if let Err(error) = &outcome.result {
            tracing::warn!(context, url = %outcome.url, %error, "asset cleanup failed");
        }
    }
    let summary = CleanupSummary::of(outcomes);
    if summary.deleted > 0 {
        tracing::debug!(context, deleted = summary.deleted, failed = summary.failed, "asset cleanup finished");
    }
}
