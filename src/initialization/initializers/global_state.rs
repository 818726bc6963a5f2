use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::ResourceInitializer;
use crate::domain::ResourceKind;
use crate::storage::FileStorageService;

/// A stored entry; its `version` field is not needed for seeding.
#[derive(Debug, Deserialize)]
struct StorageValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct GlobalStateSyncContent {
    #[serde(default)]
    storage: BTreeMap<String, StorageValue>,
}

/// Seeds global storage keys that have no local value.
#[derive(Debug)]
pub struct GlobalStateInitializer {
    storage: Arc<FileStorageService>,
    sync_home: PathBuf,
}

impl GlobalStateInitializer {
    pub fn new(storage: Arc<FileStorageService>, sync_home: PathBuf) -> Self {
        Self { storage, sync_home }
    }
}

#[async_trait]
impl ResourceInitializer for GlobalStateInitializer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::GlobalState
    }

    fn sync_home(&self) -> &Path {
        &self.sync_home
    }

    async fn apply(&self, content: &str) -> Result<()> {
        let remote: GlobalStateSyncContent =
            serde_json::from_str(content).context("Invalid global state sync content")?;

        let total = remote.storage.len();
        let storage = self.storage.clone();

        // Storage persists with blocking file writes
        let stored = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut stored = 0;
            for (key, entry) in &remote.storage {
                if storage.get(key).is_some() {
                    debug!("Global state {} exists locally, keeping it", key);
                    continue;
                }
                storage.store(key, &entry.value)?;
                stored += 1;
            }
            Ok(stored)
        })
        .await
        .context("Global state task failed")??;

        info!("Initialized {}/{} global state entries", stored, total);
        Ok(())
    }
}
