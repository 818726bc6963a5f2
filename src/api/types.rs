//! Error classification for sync store responses.

use reqwest::StatusCode;

/// Failure reported by the remote sync store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unauthorized (HTTP 401) while requesting {url}; the session may have expired")]
    Unauthorized { url: String },

    #[error("Forbidden (HTTP 403) while requesting {url}")]
    Forbidden { url: String },

    #[error("Too many requests (HTTP 429) while requesting {url}")]
    TooManyRequests { url: String },

    #[error("Client upgrade required (HTTP 426) while requesting {url}")]
    UpgradeRequired { url: String },

    #[error("Server did not return the ref for {url}")]
    NoRef { url: String },

    #[error("Request to {url} failed (HTTP {status}): {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },
}

impl StoreError {
    /// Classify a non-success HTTP response.
    pub fn from_http_response(url: &str, status: StatusCode, body: String) -> Self {
        let url = url.to_string();
        match status {
            StatusCode::UNAUTHORIZED => StoreError::Unauthorized { url },
            StatusCode::FORBIDDEN => StoreError::Forbidden { url },
            StatusCode::TOO_MANY_REQUESTS => StoreError::TooManyRequests { url },
            StatusCode::UPGRADE_REQUIRED => StoreError::UpgradeRequired { url },
            _ => StoreError::Http {
                url,
                status: status.as_u16(),
                body: if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                } else {
                    body
                },
            },
        }
    }
}
