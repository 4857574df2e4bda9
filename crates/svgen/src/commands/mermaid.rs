//! `svgen mermaid` command implementation.

use std::path::Path;

use clap::Args;
use svgen_config::CliSettings;
use svgen_diagrams::{MermaidRenderer, UreqTransport};

use super::{RenderArgs, load_config, read_source, write_svg};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the mermaid command.
#[derive(Args)]
pub(crate) struct MermaidArgs {
    #[command(flatten)]
    render: RenderArgs,
}

impl MermaidArgs {
    /// Execute the mermaid command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is missing or unreadable, the service
    /// does not return SVG, or the output cannot be written.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let output = Output::new();
        let input = self.render.input("mermaid")?;

        let cli_settings = CliSettings {
            mermaid_url: self.render.url.clone(),
            timeout_secs: self.render.timeout,
            ..Default::default()
        };
        let config = load_config(config_path, &cli_settings)?;

        let source = read_source(input)?;
        let transport = UreqTransport::new(config.http.timeout());
        let svg = MermaidRenderer::new(config.mermaid.url.as_str())
            .theme(config.mermaid.theme.as_str())
            .render(&transport, &source)?;

        write_svg(&output, &source, &self.render.output_path(input), &svg)
    }
}
