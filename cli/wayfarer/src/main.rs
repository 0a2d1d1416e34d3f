//! Wayfarer CLI — create, inspect, and script exploration journeys.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wayfarer", version, about = "Exploration mapping for decision graphs")]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wayfarer project with an empty journey
    Init {
        /// Project name
        name: String,
        /// Starting decision (started immediately when given)
        #[arg(long)]
        start: Option<String>,
    },
    /// Summarize the journey: steps, decisions, zones, state
    Status,
    /// List exploration steps
    Log {
        /// Show only the last N steps
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a decision's transitions, tags, and zones
    Show {
        /// Decision name
        decision: String,
    },
    /// Run an edit-command script against the journey
    Script {
        /// Path to the command-list file
        file: PathBuf,
        /// Parse and run without saving the result
        #[arg(long)]
        dry_run: bool,
    },
    /// Verify the journey file's integrity
    Check,
}

fn main() {
    let cli = Cli::parse();
    let project_dir = cli.dir.unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Commands::Init { name, start } => commands::init::run(&project_dir, &name, start.as_deref()),
        Commands::Status => commands::status::run(&project_dir),
        Commands::Log { limit } => commands::log::run(&project_dir, limit),
        Commands::Show { decision } => commands::show::run(&project_dir, &decision),
        Commands::Script { file, dry_run } => commands::script::run(&project_dir, &file, dry_run),
        Commands::Check => commands::check::run(&project_dir),
    };

    if let Err(error) = result {
        eprintln!("error: {error:#}");
        process::exit(1);
    }
}
