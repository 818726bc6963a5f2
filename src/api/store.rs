//! Client for the remote user-data sync store.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use super::client::ApiClient;
use super::types::StoreError;
use crate::domain::{RemoteUserData, ResourceKind};
use crate::session::SessionInfo;

/// Read access to resources kept in the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the latest version of `kind`. With a `cursor`, an unchanged
    /// resource returns the cursor itself.
    async fn read_resource(
        &self,
        kind: ResourceKind,
        cursor: Option<&RemoteUserData>,
    ) -> Result<RemoteUserData>;
}

/// Builds an authenticated store client for an endpoint and a session.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, url: &Url, session: &SessionInfo) -> Result<Arc<dyn RemoteStore>>;
}

/// Authentication attached to a store client.
#[derive(Clone)]
struct StoreAuthentication {
    access_token: String,
    account_type: String,
}

/// HTTP implementation of [`RemoteStore`].
///
/// All clients built from one [`HttpStoreConnector`] share the same
/// `reqwest::Client`, so connections to the store are pooled.
#[derive(Clone)]
pub struct UserDataSyncStoreClient {
    api: Arc<ApiClient>,
    store_url: Url,
    authentication: Option<StoreAuthentication>,
}

impl UserDataSyncStoreClient {
    /// Create a client for the store at `url` (requests go to `<url>/v1/...`).
    pub fn new(api: Arc<ApiClient>, url: &Url) -> Result<Self> {
        let store_url = ApiClient::build_url(url, &["v1"])?;
        Ok(Self {
            api,
            store_url,
            authentication: None,
        })
    }

    /// Attach the credential sent with every request.
    pub fn set_authentication(&mut self, access_token: &str, account_type: &str) {
        self.authentication = Some(StoreAuthentication {
            access_token: access_token.to_string(),
            account_type: account_type.to_string(),
        });
    }

    pub fn store_url(&self) -> &Url {
        &self.store_url
    }

    fn resource_url(&self, kind: ResourceKind) -> Result<Url> {
        ApiClient::build_url(&self.store_url, &["resource", kind.as_str(), "latest"])
    }

    fn request_headers(&self, cursor: Option<&RemoteUserData>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(cursor) = cursor {
            let value = HeaderValue::from_str(&cursor.reference)
                .context("Invalid ref for If-None-Match header")?;
            headers.insert(IF_NONE_MATCH, value);
        }

        let auth = self
            .authentication
            .as_ref()
            .context("No authentication attached to the sync store client")?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", auth.access_token))
            .context("Invalid access token")?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            "x-account-type",
            HeaderValue::from_str(&auth.account_type).context("Invalid account type")?,
        );

        Ok(headers)
    }
}

#[async_trait]
impl RemoteStore for UserDataSyncStoreClient {
    async fn read_resource(
        &self,
        kind: ResourceKind,
        cursor: Option<&RemoteUserData>,
    ) -> Result<RemoteUserData> {
        let url = self.resource_url(kind)?;
        let headers = self.request_headers(cursor)?;

        let response = self.api.get(&url, headers).await?;
        let status = response.status();
        debug!("=== API Response ===");
        debug!("Status: {}", status);

        if status == StatusCode::NOT_MODIFIED {
            if let Some(cursor) = cursor {
                return Ok(cursor.clone());
            }
        }

        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_http_response(url.as_str(), status, body).into());
        }

        let reference = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::NoRef {
                url: url.to_string(),
            })?;

        let content = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(RemoteUserData {
            reference,
            content: (!content.is_empty()).then_some(content),
        })
    }
}

impl std::fmt::Debug for UserDataSyncStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataSyncStoreClient")
            .field("store_url", &self.store_url.as_str())
            .field(
                "authentication",
                &self.authentication.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Connects to the store over HTTP, reusing one [`ApiClient`].
#[derive(Clone)]
pub struct HttpStoreConnector {
    api: Arc<ApiClient>,
}

impl HttpStoreConnector {
    pub fn new(api: ApiClient) -> Self {
        Self { api: Arc::new(api) }
    }
}

impl StoreConnector for HttpStoreConnector {
    fn connect(&self, url: &Url, session: &SessionInfo) -> Result<Arc<dyn RemoteStore>> {
        let mut client = UserDataSyncStoreClient::new(self.api.clone(), url)?;
        client.set_authentication(&session.access_token, &session.provider_id);
        Ok(Arc::new(client))
    }
}
