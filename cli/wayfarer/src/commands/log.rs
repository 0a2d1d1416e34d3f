//! `wayfarer log` — list exploration steps.

use std::path::Path;

use anyhow::Result;

use crate::commands::load_journey;

pub fn run(project_dir: &Path, limit: Option<usize>) -> Result<()> {
    let (_, exploration, _) = load_journey(project_dir)?;

    if exploration.is_empty() {
        println!("No steps yet.");
        return Ok(());
    }

    let total = exploration.len();
    let first = match limit {
        Some(limit) => total.saturating_sub(limit),
        None => 0,
    };

    println!("{:<6}  {:<20}  {:<20}  TAGS", "STEP", "VIA", "POSITION");
    println!("{}", "-".repeat(64));
    for (index, step) in exploration.steps().iter().enumerate().skip(first) {
        let via = step.transition.as_deref().unwrap_or("-");
        let position = step.position.as_deref().unwrap_or("(none)");
        let tags: Vec<&str> = step.tags.iter().map(String::as_str).collect();
        println!("{index:<6}  {via:<20}  {position:<20}  {}", tags.join(","));
    }

    Ok(())
}
