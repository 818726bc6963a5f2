use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cli::{resolve_profile_dir, resolve_workspace, SessionArgs};
use userdata_init::api::{ApiClient, HttpStoreConnector, RetryPolicy};
use userdata_init::environment::{Environment, EnvironmentOptions, ProductConfig, UserDataPaths};
use userdata_init::initialization::UserDataInitializationService;
use userdata_init::session::CredentialsAuthProvider;
use userdata_init::storage::FileStorageService;

/// Everything a command needs to drive the initialization service.
pub struct Host {
    pub service: Arc<UserDataInitializationService>,
    pub storage: Arc<FileStorageService>,
}

impl Host {
    pub fn from_args(args: &SessionArgs) -> Result<Self> {
        let profile_home = resolve_profile_dir(args.profile_dir.as_deref())?;
        let workspace = resolve_workspace(args.workspace.as_deref())?;
        debug!(
            "Profile: {:?}, workspace: {:?}, web: {}",
            profile_home, workspace, args.web
        );

        let options = EnvironmentOptions::load(args.options.as_deref().map(Path::new))?;
        let product = ProductConfig::load(args.product.as_deref().map(Path::new))?;
        let environment = Environment::new(args.web, options, UserDataPaths::new(&profile_home));
        let storage = Arc::new(FileStorageService::open(
            &profile_home,
            workspace.as_deref(),
        )?);

        let api = ApiClient::new(None)?.with_retry_policy(retry_policy(args.max_retries));
        let connector = HttpStoreConnector::new(api);
        let service = UserDataInitializationService::new(
            Arc::new(environment),
            Arc::new(product),
            storage.clone(),
            Arc::new(CredentialsAuthProvider::new()),
            Arc::new(connector),
        );

        Ok(Self {
            service: Arc::new(service),
            storage,
        })
    }
}

fn retry_policy(max_retries: Option<usize>) -> RetryPolicy {
    match max_retries {
        Some(0) => RetryPolicy::none(),
        Some(max_retries) => RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        },
        None => RetryPolicy::default(),
    }
}
