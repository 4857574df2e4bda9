//! Graphviz DOT rendering.
//!
//! The graph is sent as `{graph, layout, format}` JSON in a POST to
//! `{server}/graphviz`.

use serde::Serialize;
use tracing::info;

use crate::consts::DEFAULT_GRAPHVIZ_LAYOUT;
use crate::error::RenderError;
use crate::source::SourceDocument;
use crate::transport::{HttpRequest, Transport, validate_svg};

#[derive(Serialize)]
struct Envelope<'a> {
    graph: &'a str,
    layout: &'a str,
    format: &'a str,
}

/// Renders DOT source through a QuickChart-compatible Graphviz endpoint.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    server_url: String,
    layout: String,
}

impl GraphvizRenderer {
    /// Create a renderer for the given service root.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            layout: DEFAULT_GRAPHVIZ_LAYOUT.to_owned(),
        }
    }

    /// Set the layout engine (default: `"dot"`).
    #[must_use]
    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Build the POST request for `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn request(&self, source: &str) -> Result<HttpRequest, RenderError> {
        let body = serde_json::to_string(&Envelope {
            graph: source,
            layout: &self.layout,
            format: "svg",
        })?;
        Ok(HttpRequest::post_json(
            format!("{}/graphviz", self.server_url),
            body,
        ))
    }

    /// Render `source` to SVG.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not SVG.
    pub fn render(
        &self,
        transport: &dyn Transport,
        source: &SourceDocument,
    ) -> Result<String, RenderError> {
        let request = self.request(source.text())?;
        info!(bytes = source.len(), layout = %self.layout, "Rendering Graphviz graph");
        let response = transport.send(&request)?;
        validate_svg(response)
    }
}
