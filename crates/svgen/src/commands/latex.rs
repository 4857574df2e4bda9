//! `svgen latex` command implementation.

use std::path::Path;

use clap::Args;
use svgen_config::CliSettings;
use svgen_diagrams::{LatexRenderer, UreqTransport};

use super::{RenderArgs, load_config, read_source, write_svg};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the latex command.
#[derive(Args)]
pub(crate) struct LatexArgs {
    #[command(flatten)]
    render: RenderArgs,

    /// Rendering resolution passed as `\dpi{N}` (overrides config).
    #[arg(long)]
    dpi: Option<u32>,
}

impl LatexArgs {
    /// Execute the latex command.
    ///
    /// Failed blocks are reported as warnings and left out of the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is missing or unreadable, or the
    /// output cannot be written.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let output = Output::new();
        let input = self.render.input("latex")?;

        let cli_settings = CliSettings {
            latex_url: self.render.url.clone(),
            dpi: self.dpi,
            timeout_secs: self.render.timeout,
            ..Default::default()
        };
        let config = load_config(config_path, &cli_settings)?;

        let source = read_source(input)?;
        let transport = UreqTransport::new(config.http.timeout());
        let result = LatexRenderer::new(config.latex.url.as_str())
            .dpi(config.latex.dpi)
            .max_redirects(config.http.max_redirects)
            .render(&transport, &source)?;

        for error in &result.errors {
            output.warning(&format!("Warning: {error}"));
        }
        if result.blocks > 1 || !result.errors.is_empty() {
            output.info(&format!(
                "Rendered {} of {} blocks",
                result.rendered(),
                result.blocks
            ));
        }

        write_svg(&output, &source, &self.render.output_path(input), &result.svg)
    }
}
