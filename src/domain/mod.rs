//! Domain types shared across modules.
//!
//! The remote store client, the initializers and the orchestrator all talk
//! about the same resource kinds and payloads. Keeping them here avoids
//! circular dependencies between `api` and `initialization`.

use serde::{Deserialize, Serialize};

/// Local subsystems that can be seeded from the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Settings,
    Keybindings,
    Snippets,
    GlobalState,
    Extensions,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Settings,
        ResourceKind::Keybindings,
        ResourceKind::Snippets,
        ResourceKind::GlobalState,
        ResourceKind::Extensions,
    ];

    /// Key of the resource in the remote store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Settings => "settings",
            ResourceKind::Keybindings => "keybindings",
            ResourceKind::Snippets => "snippets",
            ResourceKind::GlobalState => "globalState",
            ResourceKind::Extensions => "extensions",
        }
    }

    /// Name used for the last-sync record file (`lastSync<Name>.json`).
    pub(crate) fn record_name(&self) -> &'static str {
        match self {
            ResourceKind::Settings => "Settings",
            ResourceKind::Keybindings => "Keybindings",
            ResourceKind::Snippets => "Snippets",
            ResourceKind::GlobalState => "GlobalState",
            ResourceKind::Extensions => "Extensions",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource as returned by the remote store.
///
/// `reference` is the ETag of the stored version and doubles as the cursor
/// for conditional reads. `content` is `None` when nothing was ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUserData {
    #[serde(rename = "ref")]
    pub reference: String,
    pub content: Option<String>,
}

/// Versioned envelope wrapped around every stored resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    pub content: String,
}

impl SyncData {
    /// Parse the envelope, returning `None` for anything that is not one.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
