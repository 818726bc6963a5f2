//! Remote-seeded initialization of local user data.
//!
//! [`UserDataInitializationService`] decides whether this process should
//! seed anything (web session, sync on by default, fresh profile and
//! workspace, configured store, signed-in account), lazily connects to the
//! remote store once, and drives one [`ResourceInitializer`] per requested
//! [`ResourceKind`](crate::domain::ResourceKind).

mod error;
mod initializers;
mod request;
mod service;
#[cfg(test)]
mod tests;

pub use error::{InitError, InitResult};
pub use initializers::{
    create_initializer, last_sync_record_path, ExtensionIdentifier, ExtensionInstaller,
    ExtensionsInitializer, GlobalStateInitializer, InitializerContext, InstalledExtension,
    KeybindingsInitializer, ManifestExtensionInstaller, ResourceInitializer, SettingsInitializer,
    SnippetsInitializer, SyncExtension,
};
pub use request::{InitRequest, LocalResource};
pub use service::{
    Connection, InitTimeouts, SkipReason, UserDataInitializationService, DEFAULT_AUTH_TIMEOUT,
    DEFAULT_READ_TIMEOUT,
};
