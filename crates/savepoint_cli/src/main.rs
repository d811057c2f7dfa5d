//! Savepoint CLI
//!
//! Runs the savepoint teaching scenarios against an in-memory store.
//!
//! # Commands
//!
//! - `scenario` - Run one of the reference scenarios (a, b, c) or all of them
//! - `enroll` - Enroll a student with details in a guarded block
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Savepoint-scoped transaction runner demos.
#[derive(Parser)]
#[command(name = "savepoint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reference scenario on a fresh store
    Scenario {
        /// Scenario to run (a, b, c, all)
        #[arg(default_value = "all", value_parser = ["a", "b", "c", "all"])]
        name: String,
    },

    /// Enroll a student; details are written inside a savepoint
    Enroll {
        /// Student name (at most 20 characters)
        #[arg(short, long)]
        name: String,

        /// Age, parsed as an integer inside the guarded block
        #[arg(short, long)]
        age: String,

        /// Home address (at most 100 characters)
        #[arg(long, default_value = "Beijing")]
        home: String,

        /// Abort the whole enrollment if the details fail
        #[arg(short, long)]
        propagate: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scenario { name } => {
            commands::scenario::run(&name, &cli.format)?;
        }
        Commands::Enroll {
            name,
            age,
            home,
            propagate,
        } => {
            commands::enroll::run(&name, &age, &home, propagate, &cli.format)?;
        }
        Commands::Version => {
            println!("Savepoint CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Savepoint Core v{}", savepoint_core::VERSION);
        }
    }

    Ok(())
}
