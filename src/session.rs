//! Authentication session lookup.
//!
//! The embedder stores the signed-in account in a credentials provider as a
//! JSON secret under service `<url_protocol>.login`, account `account`. This
//! module reads that secret back and validates it before the initialization
//! service uses it to authenticate against the sync store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::environment::{CredentialsProvider, Environment, ProductConfig};

/// Environment variable holding credentials for `CredentialsProvider::Environment`.
pub const CREDENTIALS_ENV: &str = "USERDATA_CREDENTIALS";

/// Account name the session secret is stored under.
const SESSION_ACCOUNT: &str = "account";

/// Authentication session as stored by the embedder.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub access_token: String,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_sign_out: Option<bool>,
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("id", &self.id)
            .field("access_token", &"[REDACTED]")
            .field("provider_id", &self.provider_id)
            .finish()
    }
}

/// A single secret entry in a credentials store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub service: String,
    pub account: String,
    pub password: String,
}

/// Supplies the current authentication session, if any.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn current_session_info(
        &self,
        environment: &Environment,
        product: &ProductConfig,
    ) -> Result<Option<SessionInfo>>;
}

/// Reads the session from the credentials provider named in the environment.
#[derive(Debug, Default)]
pub struct CredentialsAuthProvider;

impl CredentialsAuthProvider {
    pub fn new() -> Self {
        Self
    }

    fn load_entries(provider: &CredentialsProvider) -> Result<Vec<CredentialEntry>> {
        match provider {
            CredentialsProvider::Environment => match std::env::var(CREDENTIALS_ENV) {
                Ok(raw) => serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", CREDENTIALS_ENV)),
                Err(_) => Ok(Vec::new()),
            },
            CredentialsProvider::File { path } => read_credentials_file(path),
        }
    }
}

#[async_trait]
impl AuthenticationProvider for CredentialsAuthProvider {
    async fn current_session_info(
        &self,
        environment: &Environment,
        product: &ProductConfig,
    ) -> Result<Option<SessionInfo>> {
        let Some(provider) = environment.options.credentials_provider.as_ref() else {
            return Ok(None);
        };

        let service = format!("{}.login", product.url_protocol);
        let entries = Self::load_entries(provider)?;

        let secret = entries
            .iter()
            .find(|e| e.service == service && e.account == SESSION_ACCOUNT)
            .map(|e| e.password.as_str());

        match secret {
            Some(raw) => Ok(parse_session(raw)),
            None => {
                debug!("No credentials stored for service {}", service);
                Ok(None)
            }
        }
    }
}

fn read_credentials_file(path: &Path) -> Result<Vec<CredentialEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse credentials file: {:?}", path))
}

/// Parse and validate a stored session secret.
fn parse_session(raw: &str) -> Option<SessionInfo> {
    match serde_json::from_str::<SessionInfo>(raw) {
        Ok(session) => {
            if session.id.is_empty()
                || session.access_token.is_empty()
                || session.provider_id.is_empty()
            {
                warn!("Session validation failed: missing or invalid required fields");
                return None;
            }
            Some(session)
        }
        Err(e) => {
            warn!("Failed to parse session JSON: {}", e);
            None
        }
    }
}
