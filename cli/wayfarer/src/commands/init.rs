//! `wayfarer init` — create a project manifest and an empty journey.

use std::path::Path;

use anyhow::Result;

use wayfarer_explore::{Exploration, JourneyFile};

use crate::manifest::{WayfarerManifest, MANIFEST_NAME};

pub fn run(project_dir: &Path, name: &str, start: Option<&str>) -> Result<()> {
    std::fs::create_dir_all(project_dir)?;

    let manifest_path = project_dir.join(MANIFEST_NAME);
    if manifest_path.exists() {
        println!("{MANIFEST_NAME} already exists at {}", manifest_path.display());
        return Ok(());
    }

    let manifest = WayfarerManifest::new(name);
    manifest.save(project_dir)?;

    let mut exploration = Exploration::new();
    if let Some(decision) = start {
        exploration
            .start(decision, &[], None, None)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    let journey_path = manifest.journey_path(project_dir);
    let file = JourneyFile::new(exploration);
    let bytes = file.to_bytes().map_err(|e| anyhow::anyhow!("{e}"))?;
    std::fs::write(&journey_path, bytes)?;

    println!("Created {}", manifest_path.display());
    println!("Created {}", journey_path.display());
    match start {
        Some(decision) => println!("Journey started at '{decision}'."),
        None => println!("Use `wayfarer script` to start exploring."),
    }
    Ok(())
}
