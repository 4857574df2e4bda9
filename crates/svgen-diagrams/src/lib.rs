//! Diagram and math rendering to SVG via remote services.
//!
//! This crate turns diagram or math source text into SVG by delegating to
//! public rendering services:
//! - [`MermaidRenderer`]: pako-encoded GET against a `mermaid.ink`-style service
//! - [`GraphvizRenderer`]: JSON POST against a QuickChart-style endpoint
//! - [`LatexRenderer`]: one GET per extracted math block, fanned out in
//!   parallel and stacked into a single document
//!
//! # Architecture
//!
//! The crate is organized into modules:
//! - [`source`]: input documents and output path defaults
//! - [`transport`]: the [`Transport`] seam, `ureq` backend and redirect handling
//! - [`svg`]: fragment measurement and vertical composition
//! - `mermaid`, `graphviz`, `latex`: per-pipeline encoders and renderers
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use svgen_diagrams::{MermaidRenderer, SourceDocument, UreqTransport};
//!
//! let transport = UreqTransport::new(Duration::from_secs(30));
//! let source = SourceDocument::new("graph TD; A-->B");
//! let svg = MermaidRenderer::new("https://mermaid.ink").render(&transport, &source)?;
//! ```

pub mod consts;
mod error;
mod graphviz;
mod latex;
mod mermaid;
#[cfg(test)]
mod mock;
pub mod source;
pub mod svg;
pub mod transport;

pub use error::{BlockError, ComposeError, RenderError};
pub use graphviz::GraphvizRenderer;
pub use latex::{ExtractionBlock, LatexOutput, LatexRenderer, encode_payload, extract_blocks};
pub use mermaid::{MermaidRenderer, encode_pako};
pub use source::{SourceDocument, default_output_path};
pub use svg::{compose_stack, stack_vertically};
pub use transport::{
    HttpRequest, HttpResponse, Method, Transport, UreqTransport, get_following_redirects,
    validate_svg,
};
