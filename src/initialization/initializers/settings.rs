use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{read_optional, write_file, ResourceInitializer};
use crate::domain::ResourceKind;

#[derive(Debug, Deserialize)]
struct SettingsSyncContent {
    settings: String,
}

/// Seeds the user settings file when it has no settings yet.
#[derive(Debug)]
pub struct SettingsInitializer {
    settings_resource: PathBuf,
    sync_home: PathBuf,
}

impl SettingsInitializer {
    pub fn new(settings_resource: PathBuf, sync_home: PathBuf) -> Self {
        Self {
            settings_resource,
            sync_home,
        }
    }

    async fn has_local_settings(&self) -> Result<bool> {
        let Some(content) = read_optional(&self.settings_resource).await? else {
            return Ok(false);
        };
        let content = strip_comments(&content);
        if content.trim().is_empty() {
            return Ok(false);
        }
        // Unparseable settings (e.g. trailing commas) count as existing
        Ok(match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Object(map)) => !map.is_empty(),
            _ => true,
        })
    }
}

/// Remove `//` and `/* */` comments outside of string literals.
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[async_trait]
impl ResourceInitializer for SettingsInitializer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Settings
    }

    fn sync_home(&self) -> &Path {
        &self.sync_home
    }

    async fn apply(&self, content: &str) -> Result<()> {
        let remote: SettingsSyncContent =
            serde_json::from_str(content).context("Invalid settings sync content")?;

        if self.has_local_settings().await? {
            info!("Skipping initializing settings because local settings exist.");
            return Ok(());
        }

        write_file(&self.settings_resource, &remote.settings).await
    }
}
