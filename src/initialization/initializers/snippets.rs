use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{write_file, ResourceInitializer};
use crate::domain::ResourceKind;

/// Seeds snippet files that do not exist locally yet.
#[derive(Debug)]
pub struct SnippetsInitializer {
    snippets_home: PathBuf,
    sync_home: PathBuf,
}

impl SnippetsInitializer {
    pub fn new(snippets_home: PathBuf, sync_home: PathBuf) -> Self {
        Self {
            snippets_home,
            sync_home,
        }
    }
}

/// Snippet names must be plain file names inside the snippets folder.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl ResourceInitializer for SnippetsInitializer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Snippets
    }

    fn sync_home(&self) -> &Path {
        &self.sync_home
    }

    async fn apply(&self, content: &str) -> Result<()> {
        let snippets: BTreeMap<String, String> =
            serde_json::from_str(content).context("Invalid snippets sync content")?;

        let mut written = 0;
        for (name, text) in &snippets {
            if !is_plain_file_name(name) {
                warn!("Ignoring snippet with invalid name: {:?}", name);
                continue;
            }

            let path = self.snippets_home.join(name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!("Snippet {} exists locally, keeping it", name);
                continue;
            }

            write_file(&path, text).await?;
            written += 1;
        }

        info!("Initialized {}/{} snippets", written, snippets.len());
        Ok(())
    }
}
