//! Host environment and product configuration.
//!
//! The environment describes how the host was launched (web or local
//! install, embedder options) and where the user data of the profile lives.
//! The product configuration names the remote sync store endpoint.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Environment variable that forces `enable_sync_by_default` on or off.
pub const SYNC_BY_DEFAULT_ENV: &str = "USERDATA_SYNC_BY_DEFAULT";

/// Where the authentication session secret is stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CredentialsProvider {
    /// Secrets come from the `USERDATA_CREDENTIALS` environment variable.
    Environment,
    /// Secrets come from a JSON credentials file.
    File { path: PathBuf },
}

/// Options supplied by the embedder at launch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOptions {
    #[serde(default)]
    pub enable_sync_by_default: Option<bool>,
    #[serde(default)]
    pub credentials_provider: Option<CredentialsProvider>,
    /// `false` seeds the keybindings shared by all platforms instead of the
    /// current platform's.
    #[serde(default)]
    pub keybindings_per_platform: Option<bool>,
}

impl EnvironmentOptions {
    /// Load launch options from a JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut options = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read launch options: {:?}", path))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse launch options: {:?}", path))?
            }
            None => Self::default(),
        };

        if let Ok(value) = std::env::var(SYNC_BY_DEFAULT_ENV) {
            let value = value.to_lowercase();
            options.enable_sync_by_default =
                Some(matches!(value.as_str(), "1" | "true" | "yes" | "on"));
            debug!(
                "{} overrides enable_sync_by_default={:?}",
                SYNC_BY_DEFAULT_ENV, options.enable_sync_by_default
            );
        }

        Ok(options)
    }
}

/// Locations of the user data of one profile.
#[derive(Debug, Clone)]
pub struct UserDataPaths {
    pub profile_home: PathBuf,
    pub settings_resource: PathBuf,
    pub keybindings_resource: PathBuf,
    pub snippets_home: PathBuf,
    pub extensions_manifest: PathBuf,
    /// Last-sync records live here, one folder per resource kind.
    pub sync_home: PathBuf,
}

impl UserDataPaths {
    pub fn new(profile_home: impl Into<PathBuf>) -> Self {
        let profile_home = profile_home.into();
        let user_home = profile_home.join("User");
        Self {
            settings_resource: user_home.join("settings.json"),
            keybindings_resource: user_home.join("keybindings.json"),
            snippets_home: user_home.join("snippets"),
            extensions_manifest: profile_home.join("extensions").join("extensions.json"),
            sync_home: user_home.join("sync"),
            profile_home,
        }
    }
}

/// Process environment as seen by the initialization service.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Running as a web-hosted session rather than a local install.
    pub is_web: bool,
    pub options: EnvironmentOptions,
    pub paths: UserDataPaths,
}

impl Environment {
    pub fn new(is_web: bool, options: EnvironmentOptions, paths: UserDataPaths) -> Self {
        Self {
            is_web,
            options,
            paths,
        }
    }
}

/// Remote sync store section of the product configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStoreConfig {
    pub url: String,
}

/// Product configuration (product.json).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductConfig {
    #[serde(default = "default_url_protocol")]
    pub url_protocol: String,
    #[serde(default)]
    pub user_data_sync_store: Option<SyncStoreConfig>,
}

fn default_url_protocol() -> String {
    "userdata".to_string()
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            url_protocol: default_url_protocol(),
            user_data_sync_store: None,
        }
    }
}

impl ProductConfig {
    /// Load product configuration. A missing path yields the default product,
    /// which has no sync store configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read product configuration: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse product configuration: {:?}", path))
    }

    /// Endpoint of the remote sync store, if one is configured and valid.
    pub fn sync_store_url(&self) -> Option<Url> {
        let config = self.user_data_sync_store.as_ref()?;
        match Url::parse(&config.url) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("Ignoring invalid sync store URL {}: {}", config.url, e);
                None
            }
        }
    }
}
