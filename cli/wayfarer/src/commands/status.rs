//! `wayfarer status` — summarize the journey.

use std::path::Path;

use anyhow::Result;

use crate::commands::load_journey;

pub fn run(project_dir: &Path) -> Result<()> {
    let (manifest, exploration, _) = load_journey(project_dir)?;
    let graph = exploration.current_graph();

    println!("Project:    {}", manifest.project.name);
    println!("Steps:      {}", exploration.len());
    match exploration.get_current_position() {
        Some(position) => println!("Position:   {position}"),
        None => println!("Position:   (none)"),
    }
    println!("Decisions:  {}", graph.decision_count());
    println!("Transitions: {}", graph.transition_count());
    println!("Zones:      {}", graph.zone_count());

    let unknown: Vec<&String> = graph
        .decisions()
        .filter(|d| graph.is_unknown(d).unwrap_or(false))
        .collect();
    println!("Unexplored: {}", unknown.len());

    let state = exploration.current_state();
    if !state.powers.is_empty() {
        let powers: Vec<&str> = state.powers.iter().map(String::as_str).collect();
        println!("Powers:     {}", powers.join(", "));
    }
    if !state.tokens.is_empty() {
        let tokens: Vec<String> = state
            .tokens
            .iter()
            .map(|(token, count)| format!("{token}={count}"))
            .collect();
        println!("Tokens:     {}", tokens.join(", "));
    }

    Ok(())
}
