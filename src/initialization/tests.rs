//! Tests for the initialization service.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use url::Url;

    use crate::api::{RemoteStore, StoreConnector};
    use crate::domain::{RemoteUserData, ResourceKind, SyncData};
    use crate::environment::{
        CredentialsProvider, Environment, EnvironmentOptions, ProductConfig, SyncStoreConfig,
        UserDataPaths,
    };
    use crate::initialization::{
        last_sync_record_path, ExtensionInstaller, InitError, InitTimeouts,
        ManifestExtensionInstaller, SkipReason, UserDataInitializationService,
    };
    use crate::lifecycle::{spawn_other_resources_contribution, Lifecycle, LifecyclePhase};
    use crate::session::{AuthenticationProvider, SessionInfo};
    use crate::storage::FileStorageService;

    // ========== Fakes ==========

    #[derive(Default)]
    struct FakeStore {
        reads: Mutex<HashMap<ResourceKind, usize>>,
        failing: Vec<ResourceKind>,
        delay: Duration,
    }

    impl FakeStore {
        fn reads(&self, kind: ResourceKind) -> usize {
            self.reads.lock().unwrap().get(&kind).copied().unwrap_or(0)
        }

        fn total_reads(&self) -> usize {
            self.reads.lock().unwrap().values().sum()
        }
    }

    fn envelope(content: &str) -> String {
        serde_json::to_string(&SyncData {
            version: 1,
            machine_id: None,
            content: content.to_string(),
        })
        .unwrap()
    }

    fn remote_content(kind: ResourceKind) -> String {
        match kind {
            ResourceKind::Settings => envelope(r#"{"settings":"{\"remote\": true}"}"#),
            ResourceKind::Keybindings => envelope(
                r#"{"mac":"[\"remote\"]","linux":"[\"remote\"]","windows":"[\"remote\"]","all":"[\"remote\"]"}"#,
            ),
            ResourceKind::Snippets => envelope(r#"{"remote.json":"{}"}"#),
            ResourceKind::GlobalState => {
                envelope(r#"{"storage":{"remote.key":{"version":1,"value":"remote"}}}"#)
            }
            ResourceKind::Extensions => {
                envelope(r#"[{"identifier":{"id":"remote.extension"},"installed":true}]"#)
            }
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn read_resource(
            &self,
            kind: ResourceKind,
            cursor: Option<&RemoteUserData>,
        ) -> Result<RemoteUserData> {
            assert!(cursor.is_none());
            *self.reads.lock().unwrap().entry(kind).or_insert(0) += 1;

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(&kind) {
                anyhow::bail!("network error reading {}", kind);
            }

            Ok(RemoteUserData {
                reference: "1".to_string(),
                content: Some(remote_content(kind)),
            })
        }
    }

    struct FakeConnector {
        store: Arc<FakeStore>,
        connects: AtomicUsize,
    }

    impl StoreConnector for FakeConnector {
        fn connect(&self, _url: &Url, session: &SessionInfo) -> Result<Arc<dyn RemoteStore>> {
            assert_eq!(session.access_token, "token");
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.store.clone())
        }
    }

    #[derive(Clone, Copy)]
    enum AuthBehavior {
        Session,
        NoSession,
        Fail,
        Hang,
    }

    struct FakeAuth {
        behavior: AuthBehavior,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthenticationProvider for FakeAuth {
        async fn current_session_info(
            &self,
            _environment: &Environment,
            _product: &ProductConfig,
        ) -> Result<Option<SessionInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers pile up on the same attempt
            tokio::task::yield_now().await;

            match self.behavior {
                AuthBehavior::Session => Ok(Some(SessionInfo {
                    id: "s1".to_string(),
                    access_token: "token".to_string(),
                    provider_id: "github".to_string(),
                    can_sign_out: None,
                })),
                AuthBehavior::NoSession => Ok(None),
                AuthBehavior::Fail => anyhow::bail!("keychain unavailable"),
                AuthBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(None)
                }
            }
        }
    }

    // ========== Fixture ==========

    struct Fixture {
        _tmp: TempDir,
        paths: UserDataPaths,
        store: Arc<FakeStore>,
        connector: Arc<FakeConnector>,
        auth: Arc<FakeAuth>,
        service: Arc<UserDataInitializationService>,
    }

    struct Setup {
        is_web: bool,
        sync_by_default: Option<bool>,
        used_profile: bool,
        store_url: Option<&'static str>,
        credentials: bool,
        auth: AuthBehavior,
        store: FakeStore,
        timeouts: InitTimeouts,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                is_web: true,
                sync_by_default: Some(true),
                used_profile: false,
                store_url: Some("https://sync.example.com"),
                credentials: true,
                auth: AuthBehavior::Session,
                store: FakeStore::default(),
                timeouts: InitTimeouts::default(),
            }
        }
    }

    fn fixture(setup: Setup) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let profile = tmp.path().join("profile");

        if setup.used_profile {
            FileStorageService::open(&profile, None)
                .unwrap()
                .record_session()
                .unwrap();
        }

        let paths = UserDataPaths::new(&profile);
        let options = EnvironmentOptions {
            enable_sync_by_default: setup.sync_by_default,
            credentials_provider: setup
                .credentials
                .then_some(CredentialsProvider::Environment),
            keybindings_per_platform: None,
        };
        let environment = Arc::new(Environment::new(setup.is_web, options, paths.clone()));
        let product = Arc::new(ProductConfig {
            url_protocol: "test".to_string(),
            user_data_sync_store: setup.store_url.map(|url| SyncStoreConfig {
                url: url.to_string(),
            }),
        });
        let storage = Arc::new(FileStorageService::open(&profile, None).unwrap());

        let store = Arc::new(setup.store);
        let connector = Arc::new(FakeConnector {
            store: store.clone(),
            connects: AtomicUsize::new(0),
        });
        let auth = Arc::new(FakeAuth {
            behavior: setup.auth,
            calls: AtomicUsize::new(0),
        });

        let service = Arc::new(
            UserDataInitializationService::new(
                environment,
                product,
                storage,
                auth.clone(),
                connector.clone(),
            )
            .with_timeouts(setup.timeouts),
        );

        Fixture {
            _tmp: tmp,
            paths,
            store,
            connector,
            auth,
            service,
        }
    }

    fn count_files(dir: &Path) -> usize {
        walk(dir).len()
    }

    fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    files.extend(walk(&path));
                } else {
                    files.push(path);
                }
            }
        }
        files
    }

    // ========== Gating ==========

    #[tokio::test]
    async fn test_desktop_session_does_nothing() {
        let fx = fixture(Setup {
            is_web: false,
            ..Setup::default()
        });
        let files_before = count_files(&fx.paths.profile_home);

        fx.service.initialize_required_resources().await;

        assert_eq!(fx.store.total_reads(), 0);
        assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.connector.connects.load(Ordering::SeqCst), 0);
        assert_eq!(count_files(&fx.paths.profile_home), files_before);
        assert!(!fx.service.is_initialized(ResourceKind::Settings));
    }

    #[tokio::test]
    async fn test_each_failing_gate_prevents_reads() {
        let cases = [
            (
                Setup {
                    is_web: false,
                    ..Setup::default()
                },
                SkipReason::NotWeb,
            ),
            (
                Setup {
                    sync_by_default: None,
                    ..Setup::default()
                },
                SkipReason::SyncNotEnabledByDefault,
            ),
            (
                Setup {
                    sync_by_default: Some(false),
                    ..Setup::default()
                },
                SkipReason::SyncNotEnabledByDefault,
            ),
            (
                Setup {
                    used_profile: true,
                    ..Setup::default()
                },
                SkipReason::GlobalStorageNotNew,
            ),
            (
                Setup {
                    store_url: None,
                    ..Setup::default()
                },
                SkipReason::NoSyncStore,
            ),
            (
                Setup {
                    credentials: false,
                    ..Setup::default()
                },
                SkipReason::NoCredentialsProvider,
            ),
        ];

        for (setup, reason) in cases {
            let fx = fixture(setup);
            assert_eq!(fx.service.check_preconditions().unwrap_err(), reason);

            fx.service.initialize_required_resources().await;
            fx.service.initialize_other_resources().await;

            assert_eq!(fx.store.total_reads(), 0, "reads despite {:?}", reason);
            assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 0);
            assert!(!fx.service.requires_initialization().await);
        }
    }

    #[tokio::test]
    async fn test_workspace_storage_not_new() {
        let tmp = TempDir::new().unwrap();
        let profile = tmp.path().join("profile");
        let workspace = tmp.path().join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();

        // Workspace used before, but in a profile whose global metadata was lost
        FileStorageService::open(&profile, Some(&workspace))
            .unwrap()
            .record_session()
            .unwrap();
        std::fs::remove_file(profile.join("User/globalStorage/metadata.json")).unwrap();

        let storage = Arc::new(FileStorageService::open(&profile, Some(&workspace)).unwrap());
        let options = EnvironmentOptions {
            enable_sync_by_default: Some(true),
            credentials_provider: Some(CredentialsProvider::Environment),
            keybindings_per_platform: None,
        };
        let service = UserDataInitializationService::new(
            Arc::new(Environment::new(true, options, UserDataPaths::new(&profile))),
            Arc::new(ProductConfig {
                url_protocol: "test".to_string(),
                user_data_sync_store: Some(SyncStoreConfig {
                    url: "https://sync.example.com".to_string(),
                }),
            }),
            storage,
            Arc::new(FakeAuth {
                behavior: AuthBehavior::Session,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(FakeConnector {
                store: Arc::new(FakeStore::default()),
                connects: AtomicUsize::new(0),
            }),
        );

        assert_eq!(
            service.check_preconditions().unwrap_err(),
            SkipReason::WorkspaceStorageNotNew
        );
    }

    #[tokio::test]
    async fn test_authentication_failure_is_absorbed() {
        let fx = fixture(Setup {
            auth: AuthBehavior::Fail,
            ..Setup::default()
        });

        fx.service.initialize_required_resources().await;
        fx.service.initialize_other_resources().await;

        assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.connector.connects.load(Ordering::SeqCst), 0);
        assert_eq!(fx.store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_cached() {
        let fx = fixture(Setup {
            auth: AuthBehavior::NoSession,
            ..Setup::default()
        });

        assert!(!fx.service.requires_initialization().await);
        fx.service.initialize_required_resources().await;
        fx.service.initialize_other_resources().await;

        // Negative result is not re-evaluated
        assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_authentication_timeout() {
        let fx = fixture(Setup {
            auth: AuthBehavior::Hang,
            timeouts: InitTimeouts {
                authentication: Duration::from_millis(20),
                read: Duration::from_secs(5),
            },
            ..Setup::default()
        });

        let result =
            tokio::time::timeout(Duration::from_secs(5), fx.service.requires_initialization())
                .await;
        assert!(!result.unwrap());
        assert_eq!(fx.store.total_reads(), 0);
    }

    // ========== Connection ==========

    #[tokio::test]
    async fn test_concurrent_callers_share_one_connection() {
        let fx = fixture(Setup::default());

        let (a, b, c) = tokio::join!(
            fx.service.connection(),
            fx.service.connection(),
            fx.service.connection()
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(a.url().as_str(), "https://sync.example.com/");
        assert_eq!(a.session().provider_id, "github");

        let later = fx.service.connection().await.unwrap();
        assert!(Arc::ptr_eq(&a, &later));
    }

    // ========== Dispatch ==========

    #[tokio::test]
    async fn test_full_bootstrap_reads_each_kind_once() {
        let fx = fixture(Setup::default());

        fx.service.initialize_required_resources().await;
        fx.service.initialize_other_resources().await;

        for kind in [
            ResourceKind::Settings,
            ResourceKind::GlobalState,
            ResourceKind::Keybindings,
            ResourceKind::Snippets,
        ] {
            assert_eq!(fx.store.reads(kind), 1, "{}", kind);
            assert!(fx.service.is_initialized(kind));
            assert!(last_sync_record_path(&fx.paths.sync_home, kind).exists());
        }
        assert_eq!(fx.store.reads(ResourceKind::Extensions), 0);

        fx.service.initialize_required_resources().await;
        assert_eq!(fx.store.total_reads(), 4);

        let settings = std::fs::read_to_string(&fx.paths.settings_resource).unwrap();
        assert_eq!(settings, "{\"remote\": true}");
        assert_eq!(
            std::fs::read_to_string(&fx.paths.keybindings_resource).unwrap(),
            "[\"remote\"]"
        );
        assert!(fx.paths.snippets_home.join("remote.json").exists());
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_calls_read_once() {
        let fx = fixture(Setup {
            store: FakeStore {
                delay: Duration::from_millis(20),
                ..FakeStore::default()
            },
            ..Setup::default()
        });

        tokio::join!(
            fx.service.initialize_required_resources(),
            fx.service.initialize_required_resources(),
            fx.service.initialize_other_resources(),
            fx.service.initialize_required_resources(),
        );

        assert_eq!(fx.store.reads(ResourceKind::Settings), 1);
        assert_eq!(fx.store.reads(ResourceKind::GlobalState), 1);
        assert_eq!(fx.store.reads(ResourceKind::Keybindings), 1);
        assert_eq!(fx.store.reads(ResourceKind::Snippets), 1);
    }

    #[tokio::test]
    async fn test_failed_kind_does_not_block_siblings() {
        let fx = fixture(Setup {
            store: FakeStore {
                failing: vec![ResourceKind::Snippets],
                ..FakeStore::default()
            },
            ..Setup::default()
        });

        fx.service.initialize_other_resources().await;

        assert_eq!(
            std::fs::read_to_string(&fx.paths.keybindings_resource).unwrap(),
            "[\"remote\"]"
        );
        assert!(fx.service.is_initialized(ResourceKind::Snippets));
        assert!(!last_sync_record_path(&fx.paths.sync_home, ResourceKind::Snippets).exists());

        fx.service.initialize_other_resources().await;
        assert_eq!(fx.store.reads(ResourceKind::Snippets), 1);
        assert_eq!(fx.store.reads(ResourceKind::Keybindings), 1);
    }

    #[tokio::test]
    async fn test_read_timeout_marks_kind_attempted() {
        let fx = fixture(Setup {
            store: FakeStore {
                delay: Duration::from_secs(10),
                ..FakeStore::default()
            },
            timeouts: InitTimeouts {
                authentication: Duration::from_secs(5),
                read: Duration::from_millis(20),
            },
            ..Setup::default()
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            fx.service.initialize_required_resources(),
        )
        .await
        .unwrap();

        assert!(fx.service.is_initialized(ResourceKind::Settings));
        assert!(!fx.paths.settings_resource.exists());

        fx.service.initialize_required_resources().await;
        assert_eq!(fx.store.reads(ResourceKind::Settings), 1);
    }

    // ========== Extensions ==========

    #[tokio::test]
    async fn test_extensions_without_installer() {
        let fx = fixture(Setup::default());

        let err = fx.service.try_initialize_extensions(None).await.unwrap_err();

        assert_eq!(err, InitError::MissingCapability(ResourceKind::Extensions));
        assert_eq!(fx.store.total_reads(), 0);
        assert_eq!(fx.auth.calls.load(Ordering::SeqCst), 0);
        assert!(!fx.service.is_initialized(ResourceKind::Extensions));
    }

    #[tokio::test]
    async fn test_extensions_with_installer() {
        let fx = fixture(Setup::default());
        let installer = Arc::new(ManifestExtensionInstaller::new(
            fx.paths.extensions_manifest.clone(),
        ));

        fx.service
            .try_initialize_extensions(Some(installer.clone()))
            .await
            .unwrap();
        fx.service.initialize_extensions(installer.clone()).await;

        assert_eq!(fx.store.reads(ResourceKind::Extensions), 1);
        let installed = installer.installed().await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].id, "remote.extension");
    }

    // ========== Completion ==========

    #[tokio::test]
    async fn test_finished_immediately_without_connection() {
        let fx = fixture(Setup {
            is_web: false,
            ..Setup::default()
        });

        tokio::time::timeout(
            Duration::from_secs(1),
            fx.service.when_initialization_finished(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_finished_after_other_resources() {
        let fx = fixture(Setup::default());

        let waiter = {
            let service = fx.service.clone();
            tokio::spawn(async move { service.when_initialization_finished().await })
        };

        fx.service.initialize_required_resources().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        fx.service.initialize_other_resources().await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    // ========== Lifecycle contribution ==========

    #[tokio::test]
    async fn test_contribution_waits_for_restored() {
        let fx = fixture(Setup::default());
        let lifecycle = Lifecycle::new();

        let handle = spawn_other_resources_contribution(fx.service.clone(), &lifecycle).unwrap();

        lifecycle.set_phase(LifecyclePhase::Ready);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fx.store.total_reads(), 0);
        assert!(!handle.is_finished());

        lifecycle.set_phase(LifecyclePhase::Restored);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fx.store.reads(ResourceKind::Keybindings), 1);
        assert_eq!(fx.store.reads(ResourceKind::Snippets), 1);
        assert_eq!(fx.store.total_reads(), 2);

        // Already restored: a second contribution runs at once and reads nothing new
        let again = spawn_other_resources_contribution(fx.service.clone(), &lifecycle).unwrap();
        tokio::time::timeout(Duration::from_secs(1), again)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fx.store.total_reads(), 2);
    }

    #[tokio::test]
    async fn test_contribution_not_scheduled_on_desktop() {
        let fx = fixture(Setup {
            is_web: false,
            ..Setup::default()
        });
        let lifecycle = Lifecycle::new();

        assert!(spawn_other_resources_contribution(fx.service.clone(), &lifecycle).is_none());

        lifecycle.set_phase(LifecyclePhase::Restored);
        tokio::task::yield_now().await;
        assert_eq!(fx.store.total_reads(), 0);
    }
}
