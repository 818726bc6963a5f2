//! Persisted storage for the global and workspace scopes.
//!
//! Each scope keeps a `metadata.json` recording when the profile (or the
//! workspace) was first used and how many sessions ran in it. A scope whose
//! metadata did not exist when the service was opened is "new": the
//! initialization service only seeds from the remote store in that case.
//!
//! The global scope also owns a small key-value table (`storage.json`) that
//! the global state initializer writes into.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage scopes relevant for the bootstrap gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    Global,
    Workspace,
}

/// Metadata stored in each scope's metadata.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// ISO 8601 timestamp of last use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,

    /// Number of sessions started
    #[serde(default)]
    pub session_count: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_used: Option<String>,

    /// Client version at first use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_version: Option<String>,
}

#[derive(Debug)]
struct ScopeMetadata {
    metadata_path: PathBuf,
    is_new: bool,
}

impl ScopeMetadata {
    fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory: {:?}", dir))?;

        let metadata_path = dir.join("metadata.json");
        let is_new = !metadata_path.exists();

        Ok(Self {
            metadata_path,
            is_new,
        })
    }

    fn read(&self) -> Result<Metadata> {
        if !self.metadata_path.exists() {
            return Ok(Metadata::default());
        }

        let content = std::fs::read_to_string(&self.metadata_path)
            .with_context(|| format!("Failed to read metadata file: {:?}", self.metadata_path))?;

        serde_json::from_str(&content).with_context(|| "Failed to parse metadata JSON")
    }

    fn write(&self, metadata: &Metadata) -> Result<()> {
        let content =
            serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;

        std::fs::write(&self.metadata_path, content)
            .with_context(|| format!("Failed to write metadata file: {:?}", self.metadata_path))
    }

    fn record_session(&self) -> Result<()> {
        let mut metadata = self.read().unwrap_or_else(|e| {
            warn!("Failed to read metadata, starting fresh: {}", e);
            Metadata::default()
        });

        let now = chrono::Utc::now().to_rfc3339();
        metadata.last_used = Some(now.clone());
        metadata.session_count += 1;

        if metadata.first_used.is_none() {
            metadata.first_used = Some(now);
            metadata.first_version = Some(env!("CARGO_PKG_VERSION").to_string());
        }

        self.write(&metadata)?;

        debug!(
            "Session recorded in {:?}: count={}",
            self.metadata_path, metadata.session_count
        );
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageItems {
    #[serde(default)]
    items: BTreeMap<String, String>,
}

/// File-backed storage for one profile and (optionally) one workspace.
#[derive(Debug)]
pub struct FileStorageService {
    global: ScopeMetadata,
    workspace: ScopeMetadata,
    items_path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorageService {
    /// Open storage under `profile_home`. Freshness of both scopes is
    /// determined here, before anything records the current session.
    pub fn open(profile_home: &Path, workspace: Option<&Path>) -> Result<Self> {
        let global_dir = profile_home.join("User").join("globalStorage");
        let workspace_dir = profile_home
            .join("User")
            .join("workspaceStorage")
            .join(workspace_id(workspace));

        let global = ScopeMetadata::open(global_dir.clone())?;
        let workspace = ScopeMetadata::open(workspace_dir)?;

        let items_path = global_dir.join("storage.json");
        let items = if items_path.exists() {
            let content = std::fs::read_to_string(&items_path)
                .with_context(|| format!("Failed to read storage file: {:?}", items_path))?;
            serde_json::from_str::<StorageItems>(&content)
                .with_context(|| format!("Failed to parse storage file: {:?}", items_path))?
                .items
        } else {
            BTreeMap::new()
        };

        debug!(
            "Storage opened: global new={}, workspace new={}",
            global.is_new, workspace.is_new
        );

        Ok(Self {
            global,
            workspace,
            items_path,
            items: Mutex::new(items),
        })
    }

    /// Whether the scope had never been used before this process opened it.
    pub fn is_new(&self, scope: StorageScope) -> bool {
        match scope {
            StorageScope::Global => self.global.is_new,
            StorageScope::Workspace => self.workspace.is_new,
        }
    }

    /// Read a global-scope value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store a global-scope value and persist the table.
    pub fn store(&self, key: &str, value: &str) -> Result<()> {
        // Held across the write so a stale snapshot never overwrites a newer one
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());

        let snapshot = StorageItems {
            items: items.clone(),
        };
        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize storage")?;
        std::fs::write(&self.items_path, content)
            .with_context(|| format!("Failed to write storage file: {:?}", self.items_path))
    }

    /// Record this session in both scopes so later processes see them as used.
    pub fn record_session(&self) -> Result<()> {
        self.global.record_session()?;
        self.workspace.record_session()
    }
}

fn workspace_id(workspace: Option<&Path>) -> String {
    match workspace {
        Some(path) => {
            let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()).to_string()
        }
        None => "empty-window".to_string(),
    }
}
