use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::http::{send_with_retry, RetryPolicy};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the User-Agent string, honouring `USERDATA_USER_AGENT`.
fn build_user_agent() -> String {
    std::env::var("USERDATA_USER_AGENT")
        .unwrap_or_else(|_| format!("userdata-init/{}", DEFAULT_VERSION))
}

/// HTTP client shared by every store connection.
pub struct ApiClient {
    client: Client,
    user_agent: String,
    session_id: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(user_agent: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            user_agent: user_agent.unwrap_or_else(build_user_agent),
            session_id: Uuid::new_v4().to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Join path segments onto `base`, treating `base` as a directory.
    pub(super) fn build_url(base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Base URL cannot have a path: {}", base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue a GET request with the given extra headers.
    pub(super) async fn get(&self, url: &Url, headers: HeaderMap) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4().to_string();

        debug!("=== API Request ===");
        debug!("GET {}", url);

        send_with_retry(self.retry, || {
            self.client
                .get(url.clone())
                .headers(headers.clone())
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("user_agent", &self.user_agent)
            .field("session_id", &self.session_id)
            .finish()
    }
}
