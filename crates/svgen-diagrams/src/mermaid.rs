//! Mermaid flowchart rendering.
//!
//! The source is wrapped in a small JSON envelope, zlib-compressed and
//! encoded as unpadded URL-safe base64, then requested as
//! `{server}/svg/pako:{encoded}`.

use std::io::Write;

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use tracing::info;

use crate::consts::DEFAULT_MERMAID_THEME;
use crate::error::RenderError;
use crate::source::SourceDocument;
use crate::transport::{HttpRequest, Transport, validate_svg};

#[derive(Serialize)]
struct Envelope<'a> {
    code: &'a str,
    options: Options<'a>,
}

#[derive(Serialize)]
struct Options<'a> {
    theme: &'a str,
}

/// Encode Mermaid source into the `pako:` path segment.
///
/// # Errors
///
/// Returns an error if serialization or compression fails.
pub fn encode_pako(source: &str, theme: &str) -> Result<String, RenderError> {
    let json = serde_json::to_vec(&Envelope {
        code: source,
        options: Options { theme },
    })?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    Ok(BASE64_URL_SAFE_NO_PAD.encode(compressed))
}

/// Renders Mermaid source through a `mermaid.ink`-compatible service.
#[derive(Debug, Clone)]
pub struct MermaidRenderer {
    server_url: String,
    theme: String,
}

impl MermaidRenderer {
    /// Create a renderer for the given service root.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            theme: DEFAULT_MERMAID_THEME.to_owned(),
        }
    }

    /// Set the theme sent with the diagram (default: `"default"`).
    #[must_use]
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    /// Request URL for `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn request_url(&self, source: &str) -> Result<String, RenderError> {
        let encoded = encode_pako(source, &self.theme)?;
        Ok(format!("{}/svg/pako:{encoded}", self.server_url))
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
        let url = self.request_url(source.text())?;
        info!(bytes = source.len(), server = %self.server_url, "Rendering Mermaid diagram");
        let response = transport.send(&HttpRequest::get(url))?;
        validate_svg(response)
    }
}
