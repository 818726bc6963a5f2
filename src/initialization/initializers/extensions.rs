use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{read_optional, write_file, ResourceInitializer};
use crate::domain::ResourceKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionIdentifier {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// An extension entry as stored in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncExtension {
    pub identifier: ExtensionIdentifier,
    #[serde(default)]
    pub version: Option<String>,
    /// Only entries marked `Some(true)` are installed; the others carry state
    /// only (e.g. a disabled built-in).
    #[serde(default)]
    pub installed: Option<bool>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

/// An extension present in the local installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledExtension {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Capability to install and enable extensions. Required to build the
/// extensions initializer.
#[async_trait]
pub trait ExtensionInstaller: Send + Sync {
    async fn installed(&self) -> Result<Vec<InstalledExtension>>;

    async fn install(&self, extension: &SyncExtension) -> Result<()>;

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()>;
}

/// Installs extensions the local profile does not have yet and applies the
/// remote enablement state.
pub struct ExtensionsInitializer {
    installer: Arc<dyn ExtensionInstaller>,
    sync_home: PathBuf,
}

impl ExtensionsInitializer {
    pub fn new(installer: Arc<dyn ExtensionInstaller>, sync_home: PathBuf) -> Self {
        Self {
            installer,
            sync_home,
        }
    }
}

#[async_trait]
impl ResourceInitializer for ExtensionsInitializer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Extensions
    }

    fn sync_home(&self) -> &Path {
        &self.sync_home
    }

    async fn apply(&self, content: &str) -> Result<()> {
        let remote: Vec<SyncExtension> =
            serde_json::from_str(content).context("Invalid extensions sync content")?;

        let mut local: HashSet<String> = self
            .installer
            .installed()
            .await
            .context("Failed to list installed extensions")?
            .into_iter()
            .map(|e| e.id.to_lowercase())
            .collect();

        let mut installed = 0;
        for extension in &remote {
            let id = &extension.identifier.id;
            let key = id.to_lowercase();

            if !local.contains(&key) && extension.installed == Some(true) {
                match self.installer.install(extension).await {
                    Ok(()) => {
                        debug!("Installed extension {}", id);
                        local.insert(key.clone());
                        installed += 1;
                    }
                    Err(e) => {
                        warn!("Failed to install extension {}: {:#}", id, e);
                        continue;
                    }
                }
            }

            if extension.disabled == Some(true) && local.contains(&key) {
                if let Err(e) = self.installer.set_enabled(id, false).await {
                    warn!("Failed to disable extension {}: {:#}", id, e);
                }
            }
        }

        info!("Installed {} extensions from the remote store", installed);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExtensionsManifest {
    #[serde(default)]
    extensions: Vec<InstalledExtension>,
}

/// Records installed extensions in a JSON manifest for the host to pick up.
#[derive(Debug)]
pub struct ManifestExtensionInstaller {
    manifest_path: PathBuf,
    lock: Mutex<()>,
}

impl ManifestExtensionInstaller {
    pub fn new(manifest_path: PathBuf) -> Self {
        Self {
            manifest_path,
            lock: Mutex::new(()),
        }
    }

    async fn read_manifest(&self) -> Result<ExtensionsManifest> {
        match read_optional(&self.manifest_path).await? {
            Some(content) => serde_json::from_str(&content).with_context(|| {
                format!("Failed to parse extensions manifest: {:?}", self.manifest_path)
            }),
            None => Ok(ExtensionsManifest::default()),
        }
    }

    async fn write_manifest(&self, manifest: &ExtensionsManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)
            .context("Failed to serialize extensions manifest")?;
        write_file(&self.manifest_path, &content).await
    }
}

#[async_trait]
impl ExtensionInstaller for ManifestExtensionInstaller {
    async fn installed(&self) -> Result<Vec<InstalledExtension>> {
        Ok(self.read_manifest().await?.extensions)
    }

    async fn install(&self, extension: &SyncExtension) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut manifest = self.read_manifest().await?;

        let id = &extension.identifier.id;
        if manifest
            .extensions
            .iter()
            .any(|e| e.id.eq_ignore_ascii_case(id))
        {
            return Ok(());
        }

        manifest.extensions.push(InstalledExtension {
            id: id.clone(),
            version: extension.version.clone(),
            enabled: true,
        });
        self.write_manifest(&manifest).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut manifest = self.read_manifest().await?;

        let entry = manifest
            .extensions
            .iter_mut()
            .find(|e| e.id.eq_ignore_ascii_case(id))
            .with_context(|| format!("Extension {} is not installed", id))?;
        entry.enabled = enabled;

        self.write_manifest(&manifest).await
    }
}
