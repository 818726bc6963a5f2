use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolve the profile directory, defaulting to ~/.userdata.
pub fn resolve_profile_dir(profile_dir: Option<&str>) -> Result<PathBuf> {
    let dir = match profile_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".userdata"),
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create profile directory: {:?}", dir))?;
    Ok(dir)
}

/// Resolve the workspace path, if one was given.
pub fn resolve_workspace(workspace: Option<&str>) -> Result<Option<PathBuf>> {
    workspace
        .map(|path| {
            PathBuf::from(path)
                .canonicalize()
                .with_context(|| format!("Failed to canonicalize workspace: {}", path))
        })
        .transpose()
}
