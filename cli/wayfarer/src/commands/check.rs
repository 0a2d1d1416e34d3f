//! `wayfarer check` — verify journey file integrity.

use std::path::Path;

use anyhow::{Context, Result};

use wayfarer_explore::JourneyFile;

use crate::manifest::WayfarerManifest;

pub fn run(project_dir: &Path) -> Result<()> {
    let manifest = WayfarerManifest::load(project_dir)?;
    let path = manifest.journey_path(project_dir);
    let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;

    match JourneyFile::from_bytes(&data) {
        Ok(file) => {
            println!("{} is valid (format {}).", path.display(), file.version);
            println!(
                "{} step(s), {} decision(s).",
                file.exploration.len(),
                file.exploration.current_graph().decision_count()
            );
            Ok(())
        }
        Err(error) => anyhow::bail!("{}: {error}", path.display()),
    }
}
