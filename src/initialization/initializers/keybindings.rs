use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{read_optional, write_file, ResourceInitializer};
use crate::domain::ResourceKind;

/// Keybindings as stored remotely: one file per platform plus a shared one.
#[derive(Debug, Default, Deserialize)]
struct KeybindingsSyncContent {
    mac: Option<String>,
    linux: Option<String>,
    windows: Option<String>,
    all: Option<String>,
}

impl KeybindingsSyncContent {
    fn select(self, per_platform: bool, os: &str) -> Option<String> {
        if !per_platform {
            return self.all;
        }
        match os {
            "macos" => self.mac,
            "windows" => self.windows,
            _ => self.linux,
        }
    }
}

/// Seeds the keybindings file when it has no keybindings yet.
#[derive(Debug)]
pub struct KeybindingsInitializer {
    keybindings_resource: PathBuf,
    sync_home: PathBuf,
    per_platform: bool,
}

impl KeybindingsInitializer {
    pub fn new(keybindings_resource: PathBuf, sync_home: PathBuf) -> Self {
        Self {
            keybindings_resource,
            sync_home,
            per_platform: true,
        }
    }

    /// Use the shared keybindings instead of the current platform's.
    pub fn shared(mut self) -> Self {
        self.per_platform = false;
        self
    }

    async fn has_local_keybindings(&self) -> Result<bool> {
        let Some(content) = read_optional(&self.keybindings_resource).await? else {
            return Ok(false);
        };
        if content.trim().is_empty() {
            return Ok(false);
        }
        Ok(match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Array(items)) => !items.is_empty(),
            _ => true,
        })
    }
}

#[async_trait]
impl ResourceInitializer for KeybindingsInitializer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Keybindings
    }

    fn sync_home(&self) -> &Path {
        &self.sync_home
    }

    async fn apply(&self, content: &str) -> Result<()> {
        let remote: KeybindingsSyncContent =
            serde_json::from_str(content).context("Invalid keybindings sync content")?;

        let Some(keybindings) = remote.select(self.per_platform, std::env::consts::OS) else {
            info!("Skipping initializing keybindings because remote keybindings do not exist for this platform.");
            return Ok(());
        };

        if self.has_local_keybindings().await? {
            info!("Skipping initializing keybindings because local keybindings exist.");
            return Ok(());
        }

        write_file(&self.keybindings_resource, &keybindings).await
    }
}
