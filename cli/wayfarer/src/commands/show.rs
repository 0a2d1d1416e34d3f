//! `wayfarer show` — inspect a single decision.

use std::path::Path;

use anyhow::Result;

use wayfarer_core::requirement::Requirement;

use crate::commands::load_journey;

pub fn run(project_dir: &Path, decision: &str) -> Result<()> {
    let (_, exploration, _) = load_journey(project_dir)?;
    let graph = exploration.current_graph();

    if !graph.contains(decision) {
        anyhow::bail!("decision '{decision}' does not exist");
    }

    println!("Decision: {decision}");

    let tags = graph.decision_tags(decision).map_err(|e| anyhow::anyhow!("{e}"))?;
    if !tags.is_empty() {
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        println!("Tags:     {}", tags.join(", "));
    }

    let zones = graph.zone_parents(decision).map_err(|e| anyhow::anyhow!("{e}"))?;
    if !zones.is_empty() {
        let zones: Vec<String> = zones.into_iter().collect();
        println!("Zones:    {}", zones.join(", "));
    }

    let annotations = graph
        .decision_annotations(decision)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    for annotation in annotations {
        println!("Note:     {annotation}");
    }

    let outgoing = graph
        .destinations_from(decision)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if outgoing.is_empty() {
        println!("No outgoing transitions.");
        return Ok(());
    }

    println!();
    println!("{:<20}  {:<20}  {:<12}  REQUIRES", "TRANSITION", "TO", "RECIPROCAL");
    println!("{}", "-".repeat(72));
    for (name, destination) in outgoing {
        let reciprocal = graph
            .get_reciprocal(decision, &name)
            .unwrap_or_else(|| "-".to_string());
        let requirement = graph
            .get_transition_requirement(decision, &name)
            .map(|r| r.clone())
            .unwrap_or_default();
        let requires = if requirement == Requirement::Nothing {
            "-".to_string()
        } else {
            requirement.to_string()
        };
        let marker = if graph.is_unknown(&destination).unwrap_or(false) {
            "?"
        } else {
            ""
        };
        println!("{name:<20}  {:<20}  {reciprocal:<12}  {requires}", format!("{destination}{marker}"));
    }

    Ok(())
}
