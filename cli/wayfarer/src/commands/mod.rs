//! CLI subcommand implementations.

pub mod check;
pub mod init;
pub mod log;
pub mod script;
pub mod show;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use wayfarer_explore::{Exploration, JourneyFile};

use crate::manifest::WayfarerManifest;

/// Load the project manifest and journey file together.
pub fn load_journey(project_dir: &Path) -> Result<(WayfarerManifest, Exploration, PathBuf)> {
    let manifest = WayfarerManifest::load(project_dir)?;
    let path = manifest.journey_path(project_dir);
    if !path.is_file() {
        anyhow::bail!(
            "no journey file at {}\nRun `wayfarer init` first.",
            path.display()
        );
    }
    let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let file = JourneyFile::from_bytes(&data)
        .map_err(|e| anyhow::anyhow!("invalid journey file: {e}"))?;
    Ok((manifest, file.exploration, path))
}

/// Save an exploration back to its journey file.
pub fn save_journey(exploration: Exploration, path: &Path) -> Result<()> {
    let file = JourneyFile::new(exploration);
    let bytes = file.to_bytes().map_err(|e| anyhow::anyhow!("{e}"))?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
