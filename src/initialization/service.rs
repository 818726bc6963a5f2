//! The user-data initialization service.
//!
//! Seeds local user data from the remote sync store the first time a web
//! session runs in a fresh profile and workspace. Everything here is best
//! effort: no failure other than a missing extension installer reaches the
//! caller, and nothing is retried within the lifetime of the service.
//!
//! ## Usage
//!
//! ```ignore
//! let service = Arc::new(UserDataInitializationService::new(
//!     environment, product, storage, Arc::new(CredentialsAuthProvider::new()),
//!     Arc::new(HttpStoreConnector::new(ApiClient::new(None)?)),
//! ));
//! service.initialize_required_resources().await;
//! // ... once the host has restored its state:
//! service.initialize_other_resources().await;
//! service.initialize_extensions(installer).await;
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use futures_util::future::join_all;
use tokio::sync::{watch, OnceCell};
use tokio::time::timeout;
use tracing::{error, info, trace};
use url::Url;

use super::error::{InitError, InitResult};
use super::initializers::{create_initializer, ExtensionInstaller, InitializerContext};
use super::request::{InitRequest, LocalResource};
use crate::api::{RemoteStore, StoreConnector};
use crate::domain::ResourceKind;
use crate::environment::{Environment, ProductConfig};
use crate::session::{AuthenticationProvider, SessionInfo};
use crate::storage::{FileStorageService, StorageScope};

/// Default bound on acquiring the authentication session
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on reading one resource from the remote store
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Kinds needed before the host finishes starting.
const REQUIRED_RESOURCES: [LocalResource; 2] = [LocalResource::Settings, LocalResource::GlobalState];

/// Kinds seeded once the host has restored its state.
const OTHER_RESOURCES: [LocalResource; 2] = [LocalResource::Keybindings, LocalResource::Snippets];

#[derive(Debug, Clone, Copy)]
pub struct InitTimeouts {
    pub authentication: Duration,
    pub read: Duration,
}

impl Default for InitTimeouts {
    fn default() -> Self {
        Self {
            authentication: DEFAULT_AUTH_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Why remote initialization does not run in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotWeb,
    SyncNotEnabledByDefault,
    GlobalStorageNotNew,
    WorkspaceStorageNotNew,
    NoSyncStore,
    NoCredentialsProvider,
    AuthenticationFailed,
    NoSession,
    ConnectionFailed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::NotWeb => "not a web session",
            SkipReason::SyncNotEnabledByDefault => "settings sync is not enabled by default",
            SkipReason::GlobalStorageNotNew => "global storage is not new",
            SkipReason::WorkspaceStorageNotNew => "workspace storage is not new",
            SkipReason::NoSyncStore => "no sync store is configured",
            SkipReason::NoCredentialsProvider => "no credentials provider is configured",
            SkipReason::AuthenticationFailed => "the authentication session could not be read",
            SkipReason::NoSession => "there is no authentication session",
            SkipReason::ConnectionFailed => "the sync store client could not be created",
        };
        f.write_str(reason)
    }
}

/// Authenticated connection to the remote store, shared by all reads.
pub struct Connection {
    store: Arc<dyn RemoteStore>,
    url: Url,
    session: SessionInfo,
}

impl Connection {
    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("session", &self.session)
            .finish()
    }
}

/// Seeds local user data from the remote store, at most once per kind.
pub struct UserDataInitializationService {
    context: InitializerContext,
    product: Arc<ProductConfig>,
    authentication: Arc<dyn AuthenticationProvider>,
    connector: Arc<dyn StoreConnector>,
    timeouts: InitTimeouts,
    /// Resolved once; `None` is cached as well.
    connection: OnceCell<Option<Arc<Connection>>>,
    initialized: Mutex<HashSet<ResourceKind>>,
    finished: watch::Sender<bool>,
}

impl UserDataInitializationService {
    pub fn new(
        environment: Arc<Environment>,
        product: Arc<ProductConfig>,
        storage: Arc<FileStorageService>,
        authentication: Arc<dyn AuthenticationProvider>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            context: InitializerContext {
                environment,
                storage,
            },
            product,
            authentication,
            connector,
            timeouts: InitTimeouts::default(),
            connection: OnceCell::new(),
            initialized: Mutex::new(HashSet::new()),
            finished,
        }
    }

    pub fn with_timeouts(mut self, timeouts: InitTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.context.environment
    }

    /// Check the local preconditions for remote initialization, without
    /// touching credentials or the network.
    pub fn check_preconditions(&self) -> Result<Url, SkipReason> {
        let environment = self.environment();

        if !environment.is_web {
            return Err(SkipReason::NotWeb);
        }
        if environment.options.enable_sync_by_default != Some(true) {
            return Err(SkipReason::SyncNotEnabledByDefault);
        }
        if !self.context.storage.is_new(StorageScope::Global) {
            return Err(SkipReason::GlobalStorageNotNew);
        }
        if !self.context.storage.is_new(StorageScope::Workspace) {
            return Err(SkipReason::WorkspaceStorageNotNew);
        }
        let url = self.product.sync_store_url().ok_or(SkipReason::NoSyncStore)?;
        if environment.options.credentials_provider.is_none() {
            return Err(SkipReason::NoCredentialsProvider);
        }

        Ok(url)
    }

    async fn create_connection(&self) -> Result<Arc<Connection>, SkipReason> {
        let url = self.check_preconditions()?;

        let lookup = self
            .authentication
            .current_session_info(self.environment(), &self.product);
        let session = match timeout(self.timeouts.authentication, lookup).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("Failed to read the authentication session: {:#}", e);
                return Err(SkipReason::AuthenticationFailed);
            }
            Err(_) => {
                error!(
                    "Timed out after {:?} while reading the authentication session",
                    self.timeouts.authentication
                );
                return Err(SkipReason::AuthenticationFailed);
            }
        };
        let session = session.ok_or(SkipReason::NoSession)?;

        let store = self.connector.connect(&url, &session).map_err(|e| {
            error!("Failed to create the sync store client: {:#}", e);
            SkipReason::ConnectionFailed
        })?;

        info!("Connected to the sync store at {}", url);
        Ok(Arc::new(Connection {
            store,
            url,
            session,
        }))
    }

    /// The shared connection, built by the first caller.
    pub async fn connection(&self) -> Option<Arc<Connection>> {
        self.connection
            .get_or_init(|| async {
                match self.create_connection().await {
                    Ok(connection) => Some(connection),
                    Err(reason) => {
                        trace!("Skipping remote initialization: {}", reason);
                        self.finished.send_replace(true);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether this process seeds anything from the remote store.
    pub async fn requires_initialization(&self) -> bool {
        self.connection().await.is_some()
    }

    pub fn is_initialized(&self, kind: ResourceKind) -> bool {
        self.initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }

    /// Returns `false` if `kind` was already claimed.
    fn mark_initialized(&self, kind: ResourceKind) -> bool {
        self.initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind)
    }

    pub async fn initialize_required_resources(&self) {
        trace!("Initializing required resources");
        self.initialize(REQUIRED_RESOURCES.map(InitRequest::Local).to_vec())
            .await;
    }

    /// Seed keybindings and snippets, then mark initialization finished.
    pub async fn initialize_other_resources(&self) {
        trace!("Initializing other resources");
        self.initialize(OTHER_RESOURCES.map(InitRequest::Local).to_vec())
            .await;
        self.finished.send_replace(true);
    }

    pub async fn initialize_extensions(&self, installer: Arc<dyn ExtensionInstaller>) {
        trace!("Initializing extensions");
        self.initialize(vec![InitRequest::Extensions(installer)])
            .await;
    }

    /// Like [`Self::initialize_extensions`] for callers that may not have an
    /// installer. Fails before any remote work when it is missing.
    pub async fn try_initialize_extensions(
        &self,
        installer: Option<Arc<dyn ExtensionInstaller>>,
    ) -> InitResult<()> {
        let request = InitRequest::for_kind(ResourceKind::Extensions, installer)?;
        self.initialize(vec![request]).await;
        Ok(())
    }

    /// Resolves once the other resources were seeded, or immediately when
    /// there is nothing to seed.
    pub async fn when_initialization_finished(&self) {
        if self.connection().await.is_none() {
            return;
        }
        let mut finished = self.finished.subscribe();
        // The sender lives as long as `self`
        let _ = finished.wait_for(|done| *done).await;
    }

    /// Fetch and apply every request concurrently. Never fails: errors are
    /// logged per kind.
    pub async fn initialize(&self, requests: Vec<InitRequest>) {
        let Some(connection) = self.connection().await else {
            return;
        };

        join_all(
            requests
                .into_iter()
                .map(|request| self.initialize_request(&connection, request)),
        )
        .await;
    }

    async fn initialize_request(&self, connection: &Connection, request: InitRequest) {
        let kind = request.kind();

        // Claimed before the first await so concurrent callers skip it
        if !self.mark_initialized(kind) {
            trace!("{} is already initialized", kind);
            return;
        }

        if let Err(e) = self.fetch_and_apply(connection, request).await {
            info!("Error while initializing {}", kind);
            error!("{:#}", e);
        }
    }

    async fn fetch_and_apply(
        &self,
        connection: &Connection,
        request: InitRequest,
    ) -> anyhow::Result<()> {
        let kind = request.kind();

        let remote = timeout(self.timeouts.read, connection.store().read_resource(kind, None))
            .await
            .map_err(|_| InitError::Timeout {
                operation: "reading from the sync store",
                after: self.timeouts.read,
            })?
            .with_context(|| format!("Failed to read remote {}", kind))?;

        let initializer = create_initializer(request, &self.context);
        initializer
            .initialize(&remote)
            .await
            .with_context(|| format!("Failed to apply remote {}", kind))
    }
}
