use std::sync::Arc;

use super::error::{InitError, InitResult};
use super::initializers::ExtensionInstaller;
use crate::domain::ResourceKind;

/// Resource kinds whose initializers only need local collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalResource {
    Settings,
    Keybindings,
    Snippets,
    GlobalState,
}

impl LocalResource {
    pub fn kind(self) -> ResourceKind {
        match self {
            LocalResource::Settings => ResourceKind::Settings,
            LocalResource::Keybindings => ResourceKind::Keybindings,
            LocalResource::Snippets => ResourceKind::Snippets,
            LocalResource::GlobalState => ResourceKind::GlobalState,
        }
    }
}

/// One resource to initialize, carrying whatever its initializer needs.
#[derive(Clone)]
pub enum InitRequest {
    Local(LocalResource),
    Extensions(Arc<dyn ExtensionInstaller>),
}

impl InitRequest {
    /// Build a request for `kind`. Extensions cannot be requested without an
    /// installer.
    pub fn for_kind(
        kind: ResourceKind,
        installer: Option<Arc<dyn ExtensionInstaller>>,
    ) -> InitResult<Self> {
        Ok(match kind {
            ResourceKind::Settings => InitRequest::Local(LocalResource::Settings),
            ResourceKind::Keybindings => InitRequest::Local(LocalResource::Keybindings),
            ResourceKind::Snippets => InitRequest::Local(LocalResource::Snippets),
            ResourceKind::GlobalState => InitRequest::Local(LocalResource::GlobalState),
            ResourceKind::Extensions => InitRequest::Extensions(
                installer.ok_or(InitError::MissingCapability(ResourceKind::Extensions))?,
            ),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            InitRequest::Local(resource) => resource.kind(),
            InitRequest::Extensions(_) => ResourceKind::Extensions,
        }
    }
}

impl std::fmt::Debug for InitRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitRequest::Local(resource) => f.debug_tuple("Local").field(resource).finish(),
            InitRequest::Extensions(_) => f.write_str("Extensions(..)"),
        }
    }
}
