//! CLI command implementations.

pub(crate) mod graphviz;
pub(crate) mod latex;
pub(crate) mod mermaid;

use std::path::{Path, PathBuf};

use clap::Args;
use svgen_config::{CliSettings, Config};
use svgen_diagrams::{SourceDocument, default_output_path};
use tracing::debug;

use crate::error::CliError;
use crate::output::Output;

pub(crate) use graphviz::GraphvizArgs;
pub(crate) use latex::LatexArgs;
pub(crate) use mermaid::MermaidArgs;

/// Arguments shared by every pipeline.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Source file to render.
    input: Option<PathBuf>,

    /// Output SVG file (default: input path with `.svg` extension).
    output: Option<PathBuf>,

    /// Rendering service URL (overrides config).
    #[arg(long)]
    url: Option<String>,

    /// Per-request timeout in seconds (overrides config).
    #[arg(long)]
    timeout: Option<u64>,
}

impl RenderArgs {
    /// Input path, or a usage error naming the pipeline.
    fn input(&self, pipeline: &str) -> Result<&Path, CliError> {
        self.input.as_deref().ok_or_else(|| {
            CliError::Usage(format!(
                "missing input file\n\nUsage: svgen {pipeline} <INPUT> [OUTPUT]"
            ))
        })
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(input))
    }
}

/// Load configuration with command-line overrides applied.
fn load_config(
    config_path: Option<&Path>,
    cli_settings: &CliSettings,
) -> Result<Config, CliError> {
    let config = Config::load(config_path, Some(cli_settings))?;
    match &config.config_path {
        Some(path) => debug!(path = %path.display(), "Loaded configuration file"),
        None => debug!("No svgen.toml found, using defaults"),
    }
    Ok(config)
}

/// Read the input document.
fn read_source(path: &Path) -> Result<SourceDocument, CliError> {
    SourceDocument::from_path(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the rendered SVG and print the run summary.
fn write_svg(
    output: &Output,
    source: &SourceDocument,
    path: &Path,
    svg: &str,
) -> Result<(), CliError> {
    std::fs::write(path, svg).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    output.info(&format!("Input: {} bytes", source.len()));
    output.info(&format!("Output: {}", path.display()));
    output.success(&format!("Wrote {} bytes", svg.len()));
    Ok(())
}
