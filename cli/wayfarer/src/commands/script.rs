//! `wayfarer script` — run a command-list file against the journey.

use std::path::Path;

use anyhow::{Context, Result};

use wayfarer_core::parse_command_list;
use wayfarer_script::Scope;

use crate::commands::{load_journey, save_journey};

pub fn run(project_dir: &Path, file: &Path, dry_run: bool) -> Result<()> {
    let (_, mut exploration, journey_path) = load_journey(project_dir)?;

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading script {}", file.display()))?;
    let commands = parse_command_list(&text).map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut scope = Scope::new();
    exploration
        .run_command_block(&commands, &mut scope)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("Ran {} command(s).", commands.len());
    println!("Journey now has {} step(s).", exploration.len());

    if dry_run {
        println!("Dry run: not saving.");
        return Ok(());
    }

    save_journey(exploration, &journey_path)?;
    println!("Saved {}.", journey_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;

    #[test]
    fn script_drives_the_exploration() {
        let dir = tempfile::tempdir().unwrap();
        init::run(dir.path(), "caves", Some("Entrance")).unwrap();

        let script_path = dir.path().join("explore.wfs");
        std::fs::write(
            &script_path,
            "assign transitions 'tunnel'\n\
             call exploration observe\n\
             delete transitions\n\
             assign transition 'tunnel'\n\
             assign destination 'Gallery'\n\
             assign reciprocal 'back'\n\
             call exploration explore\n",
        )
        .unwrap();

        run(dir.path(), &script_path, false).unwrap();

        let (_, exploration, _) = load_journey(dir.path()).unwrap();
        assert_eq!(exploration.len(), 2);
        assert_eq!(exploration.current_position().unwrap(), "Gallery");
        assert_eq!(
            exploration
                .current_graph()
                .destination("Entrance", "tunnel")
                .unwrap(),
            "Gallery"
        );
    }

    #[test]
    fn dry_run_leaves_the_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        init::run(dir.path(), "caves", Some("Entrance")).unwrap();

        let script_path = dir.path().join("explore.wfs");
        std::fs::write(
            &script_path,
            "assign transitions 'door'\ncall exploration observe\n",
        )
        .unwrap();

        run(dir.path(), &script_path, true).unwrap();
        let (_, exploration, _) = load_journey(dir.path()).unwrap();
        assert_eq!(
            exploration
                .current_graph()
                .get_destination("Entrance", "door"),
            None
        );
    }
}
