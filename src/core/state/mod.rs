mod lock;

pub use lock::RunLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::platform::{NativePlatform, Platform};

/// Durable sync marker carried between otherwise stateless runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Highest report id processed; 0 means nothing seen yet.
    #[serde(default)]
    pub last_seen_id: u64,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn is_first_run(&self) -> bool {
        self.last_seen_id == 0
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Never fails: a missing or unreadable record yields `SyncState::default()`.
    async fn load(&self) -> SyncState;

    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// Stores the state as a single pretty-printed JSON document.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the state file so the next run starts from scratch.
    /// Returns `false` when there was nothing to remove.
    pub async fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> SyncState {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SyncState::default(),
            Err(e) => {
                warn!(
                    "[state] Could not read {} ({}), starting from scratch",
                    self.path.display(),
                    e
                );
                return SyncState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "[state] {} is corrupt ({}), starting from scratch",
                    self.path.display(),
                    e
                );
                SyncState::default()
            }
        }
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
            NativePlatform::restrict_dir_permissions(parent);
        }

        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        NativePlatform::restrict_file_permissions(&tmp);
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        info!(
            "[state] Saved: last_seen_id={}, total_sent={}",
            state.last_seen_id, state.total_sent
        );
        Ok(())
    }
}
