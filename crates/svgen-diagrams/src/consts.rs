//! Internal constants for diagram rendering.

use std::time::Duration;

/// Default `\dpi{N}` resolution for LaTeX rendering.
pub const DEFAULT_DPI: u32 = 200;

/// Default HTTP timeout for a single request (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of redirect hops followed for one request.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default Mermaid theme sent in the encoded payload.
pub const DEFAULT_MERMAID_THEME: &str = "default";

/// Default Graphviz layout engine.
pub const DEFAULT_GRAPHVIZ_LAYOUT: &str = "dot";

/// Maximum number of characters of a response body quoted in diagnostics.
pub const EXCERPT_LEN: usize = 200;

/// Fragment width used when the root `width` attribute is missing or unparseable.
pub const FALLBACK_WIDTH: f64 = 400.0;

/// Fragment height used when the root `height` attribute is missing or unparseable.
pub const FALLBACK_HEIGHT: f64 = 50.0;

/// Space above the first fragment of a stacked composition.
pub const TOP_MARGIN: f64 = 20.0;

/// Vertical space added after every fragment.
pub const FRAGMENT_GAP: f64 = 20.0;

/// Total horizontal padding added to the widest fragment.
pub const HORIZONTAL_PADDING: f64 = 40.0;
