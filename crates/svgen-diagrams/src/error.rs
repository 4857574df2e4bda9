//! Error types for rendering pipelines.

use std::str::Utf8Error;
use std::string::FromUtf8Error;

/// Error from a single render request or pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Request could not be completed (connection, DNS, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {excerpt}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        excerpt: String,
    },

    /// Server answered successfully but the body is not SVG.
    #[error("response is not SVG (HTTP {status}): {excerpt}")]
    InvalidResponse {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        excerpt: String,
    },

    /// Redirect chain exceeded the configured limit.
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects {
        /// Configured maximum number of hops.
        limit: usize,
    },

    /// Redirect response without a usable `Location` header.
    #[error("HTTP {status} redirect without Location header")]
    MissingLocation {
        /// HTTP status code.
        status: u16,
    },

    /// Worker pool for parallel requests could not be started.
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),

    /// JSON serialization error while building a payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while compressing a payload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SVG composition error.
    #[error("composition error: {0}")]
    Compose(#[from] ComposeError),
}

/// Error while reading or rewriting SVG markup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ComposeError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error.
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Write error while serializing.
    #[error("XML write error: {0}")]
    Write(#[from] std::io::Error),

    /// Element name is not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] Utf8Error),

    /// Serialized output is not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Output(#[from] FromUtf8Error),

    /// Document has no `<svg>` root element.
    #[error("no <svg> root element")]
    MissingRoot,
}

/// Failure of one LaTeX block.
#[derive(Debug, thiserror::Error)]
#[error("block {index} ({label}): {kind}")]
pub struct BlockError {
    /// Position of the block in extraction order.
    pub index: usize,
    /// Block label (environment name, `display`, `math`, `document`).
    pub label: String,
    /// Underlying failure.
    pub kind: RenderError,
}
