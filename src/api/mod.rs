//! HTTP access to the remote user-data sync store.

mod client;
mod http;
mod store;
mod types;

pub use client::ApiClient;
pub use http::RetryPolicy;
pub use store::{HttpStoreConnector, RemoteStore, StoreConnector, UserDataSyncStoreClient};
pub use types::StoreError;
