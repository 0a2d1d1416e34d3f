//! `wayfarer.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Manifest file name.
pub const MANIFEST_NAME: &str = "wayfarer.toml";

/// The top-level manifest for a wayfarer project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayfarerManifest {
    /// Project metadata.
    pub project: ProjectConfig,
    /// Journey file configuration.
    #[serde(default)]
    pub journey: JourneyConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Journey file section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyConfig {
    /// Path to the journey file, relative to the project directory.
    #[serde(default = "default_journey_path")]
    pub path: String,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            path: default_journey_path(),
        }
    }
}

fn default_journey_path() -> String {
    "journey.wfj".to_string()
}

impl WayfarerManifest {
    /// A fresh manifest for a named project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: ProjectConfig {
                name: name.into(),
                description: None,
            },
            journey: JourneyConfig::default(),
        }
    }

    /// Load the manifest from a project directory.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(MANIFEST_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let manifest: WayfarerManifest =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(manifest)
    }

    /// Write the manifest into a project directory.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = project_dir.join(MANIFEST_NAME);
        let content = toml::to_string_pretty(self).context("serializing manifest")?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// The resolved journey file path.
    pub fn journey_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.journey.path)
    }
}
