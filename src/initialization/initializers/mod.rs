//! Per-resource initializers.
//!
//! Every initializer shares the same outer flow (see
//! [`ResourceInitializer::initialize`]): skip when the remote resource is
//! empty, unreadable, or was already seeded before, otherwise apply it and
//! leave a last-sync record behind. Only `apply` differs per kind.

mod extensions;
mod global_state;
mod keybindings;
mod settings;
mod snippets;

pub use extensions::{
    ExtensionIdentifier, ExtensionInstaller, ExtensionsInitializer, InstalledExtension,
    ManifestExtensionInstaller, SyncExtension,
};
pub use global_state::GlobalStateInitializer;
pub use keybindings::KeybindingsInitializer;
pub use settings::SettingsInitializer;
pub use snippets::SnippetsInitializer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::request::{InitRequest, LocalResource};
use crate::domain::{RemoteUserData, ResourceKind, SyncData};
use crate::environment::Environment;
use crate::storage::FileStorageService;

/// Local collaborators available to every initializer.
#[derive(Debug, Clone)]
pub struct InitializerContext {
    pub environment: Arc<Environment>,
    pub storage: Arc<FileStorageService>,
}

/// Applies one fetched remote resource to local state.
#[async_trait]
pub trait ResourceInitializer: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Folder holding the last-sync records.
    fn sync_home(&self) -> &Path;

    /// Apply the unwrapped resource content.
    async fn apply(&self, content: &str) -> Result<()>;

    /// Seed local state from `remote`, at most once per profile.
    async fn initialize(&self, remote: &RemoteUserData) -> Result<()> {
        let kind = self.kind();

        let Some(raw) = remote.content.as_deref() else {
            info!(
                "Skipping initializing {} because remote data does not exist.",
                kind
            );
            return Ok(());
        };

        let Some(sync_data) = SyncData::parse(raw) else {
            info!(
                "Skipping initializing {} because remote data is not compatible with this version.",
                kind
            );
            return Ok(());
        };

        let record = last_sync_record_path(self.sync_home(), kind);
        if tokio::fs::try_exists(&record).await.unwrap_or(false) {
            info!(
                "Skipping initializing {} because it was synced before.",
                kind
            );
            return Ok(());
        }

        self.apply(&sync_data.content).await?;

        let record_content =
            serde_json::to_string(remote).context("Failed to serialize last sync record")?;
        write_file(&record, &record_content).await?;

        info!("Initialized {}", kind);
        Ok(())
    }
}

/// Build the initializer matching `request`.
pub fn create_initializer(
    request: InitRequest,
    context: &InitializerContext,
) -> Box<dyn ResourceInitializer> {
    let paths = &context.environment.paths;
    match request {
        InitRequest::Local(LocalResource::Settings) => Box::new(SettingsInitializer::new(
            paths.settings_resource.clone(),
            paths.sync_home.clone(),
        )),
        InitRequest::Local(LocalResource::Keybindings) => {
            let initializer = KeybindingsInitializer::new(
                paths.keybindings_resource.clone(),
                paths.sync_home.clone(),
            );
            if context.environment.options.keybindings_per_platform == Some(false) {
                Box::new(initializer.shared())
            } else {
                Box::new(initializer)
            }
        }
        InitRequest::Local(LocalResource::Snippets) => Box::new(SnippetsInitializer::new(
            paths.snippets_home.clone(),
            paths.sync_home.clone(),
        )),
        InitRequest::Local(LocalResource::GlobalState) => Box::new(GlobalStateInitializer::new(
            context.storage.clone(),
            paths.sync_home.clone(),
        )),
        InitRequest::Extensions(installer) => Box::new(ExtensionsInitializer::new(
            installer,
            paths.sync_home.clone(),
        )),
    }
}

/// Location of the last-sync record for `kind`.
pub fn last_sync_record_path(sync_home: &Path, kind: ResourceKind) -> PathBuf {
    sync_home
        .join(kind.as_str())
        .join(format!("lastSync{}.json", kind.record_name()))
}

/// Write `content` to `path`, creating parent folders.
pub(super) async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))?;
    debug!("Wrote {:?}", path);
    Ok(())
}

/// Read `path`, returning `None` when it does not exist.
pub(super) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read file: {:?}", path)),
    }
}
