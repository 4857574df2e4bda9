//! svgen CLI - render diagram and math sources to SVG.
//!
//! Provides commands for:
//! - `mermaid`: Render a Mermaid flowchart
//! - `graphviz`: Render a Graphviz DOT graph
//! - `latex`: Render LaTeX math, stacking multiple blocks into one SVG

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{GraphvizArgs, LatexArgs, MermaidArgs};
use output::Output;

/// svgen - render diagrams and math to SVG through public services.
#[derive(Parser)]
#[command(name = "svgen", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover svgen.toml).
    #[arg(short, long, global = true, env = "SVGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output (per-request and per-block logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a Mermaid flowchart.
    Mermaid(MermaidArgs),
    /// Render a Graphviz DOT graph.
    Graphviz(GraphvizArgs),
    /// Render LaTeX math.
    Latex(LatexArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to ERROR
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Mermaid(args) => args.execute(config_path),
        Commands::Graphviz(args) => args.execute(config_path),
        Commands::Latex(args) => args.execute(config_path),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
