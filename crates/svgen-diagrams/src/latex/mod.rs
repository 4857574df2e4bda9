//! LaTeX math rendering with multi-block composition.
//!
//! Every extracted block is requested in parallel as
//! `{server}/svg.image?{urlencoded(\dpi{N}<tex>)}`. Results are collected in
//! block order regardless of which request settles first. A single
//! successful block is returned verbatim; several are stacked into one SVG.

mod extract;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rayon::prelude::*;
use tracing::{info, warn};

pub use extract::{ExtractionBlock, extract_blocks};

use crate::consts::{DEFAULT_DPI, DEFAULT_MAX_REDIRECTS};
use crate::error::{BlockError, RenderError};
use crate::source::SourceDocument;
use crate::svg::{compose_stack, root_dimensions};
use crate::transport::{Transport, get_following_redirects, validate_svg};

/// Characters left unescaped, matching `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Result of rendering a LaTeX source.
#[derive(Debug)]
pub struct LatexOutput {
    /// Final SVG document.
    pub svg: String,
    /// Number of blocks extracted and requested.
    pub blocks: usize,
    /// Blocks left out of the output, in block order.
    pub errors: Vec<BlockError>,
}

impl LatexOutput {
    /// Number of blocks present in the output.
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.blocks - self.errors.len()
    }
}

/// Renders LaTeX through a CodeCogs-compatible service.
#[derive(Debug, Clone)]
pub struct LatexRenderer {
    server_url: String,
    dpi: u32,
    max_redirects: usize,
}

impl LatexRenderer {
    /// Create a renderer for the given service root.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            dpi: DEFAULT_DPI,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Set the `\dpi{N}` resolution (default: 200).
    #[must_use]
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set how many redirect hops a block request may follow (default: 5).
    #[must_use]
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Request URL for one block's content.
    #[must_use]
    pub fn request_url(&self, content: &str) -> String {
        let dpi = format!("\\dpi{{{}}}", self.dpi);
        format!(
            "{}/svg.image?{}{}",
            self.server_url,
            encode_payload(&dpi),
            encode_payload(content)
        )
    }

    fn render_block(
        &self,
        transport: &dyn Transport,
        index: usize,
        block: &ExtractionBlock,
    ) -> Result<String, BlockError> {
        let url = self.request_url(&block.content);
        info!(index, label = %block.label, "Rendering LaTeX block");
        get_following_redirects(transport, &url, self.max_redirects)
            .and_then(validate_svg)
            .and_then(|svg| {
                root_dimensions(&svg)?;
                Ok(svg)
            })
            .map_err(|kind| {
                warn!(index, label = %block.label, error = %kind, "LaTeX block failed");
                BlockError {
                    index,
                    label: block.label.clone(),
                    kind,
                }
            })
    }

    /// Render all blocks of `source` and combine the successful ones.
    ///
    /// Block failures do not fail the call; they are reported in
    /// [`LatexOutput::errors`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be started or
    /// composing the stacked document fails.
    pub fn render(
        &self,
        transport: &dyn Transport,
        source: &SourceDocument,
    ) -> Result<LatexOutput, RenderError> {
        let blocks = extract_blocks(source);
        info!(
            blocks = blocks.len(),
            structured = source.is_structured(),
            "Dispatching LaTeX blocks"
        );

        // One thread per block so every request is in flight at once.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(blocks.len().max(1))
            .build()
            .map_err(|e| RenderError::ThreadPool(e.to_string()))?;
        let results: Vec<Result<String, BlockError>> = pool.install(|| {
            blocks
                .par_iter()
                .enumerate()
                .map(|(index, block)| self.render_block(transport, index, block))
                .collect()
        });

        let mut fragments = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(svg) => fragments.push(svg),
                Err(error) => errors.push(error),
            }
        }

        let svg = finalize(fragments)?;
        Ok(LatexOutput {
            svg,
            blocks: blocks.len(),
            errors,
        })
    }
}

/// Percent-encode block content for the query string.
#[must_use]
pub fn encode_payload(content: &str) -> String {
    utf8_percent_encode(content, URI_COMPONENT).to_string()
}

/// Pass a single fragment through untouched; stack anything else.
fn finalize(mut fragments: Vec<String>) -> Result<String, RenderError> {
    if fragments.len() == 1
        && let Some(only) = fragments.pop()
    {
        return Ok(only);
    }
    if fragments.is_empty() {
        warn!("No LaTeX block rendered, writing background-only document");
    }
    let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
    Ok(compose_stack(&fragments)?)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread::sleep;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::HttpResponse;

    fn svg(id: &str, width: u32, height: u32) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}pt\" height=\"{height}pt\"><g id=\"{id}\"/></svg>"
        )
    }

    const TWO_ALIGNS: &str = r"\documentclass{article}
\newcommand{\R}{\mathbb{R}}
\begin{document}
\begin{align}
first
\end{align}
\begin{align}
second
\end{align}
\end{document}";

    #[test]
    fn test_encode_payload_matches_uri_component() {
        assert_eq!(encode_payload("E=mc^2"), "E%3Dmc%5E2");
        assert_eq!(encode_payload(r"\frac{a}{b}"), "%5Cfrac%7Ba%7D%7Bb%7D");
        assert_eq!(encode_payload("x y\n"), "x%20y%0A");
        assert_eq!(encode_payload("(a*b)!~'-_."), "(a*b)!~'-_.");
    }

    #[test]
    fn test_request_url_carries_dpi() {
        let renderer = LatexRenderer::new("https://latex.example/").dpi(300);

        assert_eq!(
            renderer.request_url("x^2"),
            "https://latex.example/svg.image?%5Cdpi%7B300%7Dx%5E2"
        );
    }

    #[test]
    fn test_default_dpi() {
        let url = LatexRenderer::new("https://latex.example").request_url("x");
        assert!(url.contains("%5Cdpi%7B200%7D"));
    }

    #[test]
    fn test_raw_math_single_result_verbatim() {
        let body = svg("only", 50, 12);
        let expected = body.clone();
        let transport = MockTransport::new(move |_| Ok(HttpResponse::ok(body.as_str())));

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new("$$E=mc^2$$"))
            .unwrap();

        assert_eq!(output.svg, expected);
        assert_eq!(output.blocks, 1);
        assert_eq!(output.rendered(), 1);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with(&encode_payload("$$E=mc^2$$")));
    }

    #[test]
    fn test_two_blocks_composed_with_preamble() {
        let transport = MockTransport::new(|req| {
            Ok(if req.url.contains("first") {
                HttpResponse::ok(svg("first", 120, 30))
            } else {
                HttpResponse::ok(svg("second", 200, 40))
            })
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        assert_eq!(output.blocks, 2);
        assert!(output.errors.is_empty());

        let preamble = encode_payload("\\newcommand{\\R}{\\mathbb{R}}\n");
        let prefix = format!("https://latex.example/svg.image?%5Cdpi%7B200%7D{preamble}");
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.url.starts_with(&prefix), "{}", request.url);
        }

        // 20 + (30 + 20) + (40 + 20) = 130; 200 + 40 = 240
        assert!(output.svg.contains("width=\"240\" height=\"130\""));
        assert!(output.svg.contains("width=\"120pt\" height=\"30pt\" x=\"20\" y=\"20\""));
        assert!(output.svg.contains("width=\"200pt\" height=\"40pt\" x=\"20\" y=\"70\""));
        assert!(!output.svg.contains("<?xml"));
    }

    #[test]
    fn test_order_follows_blocks_not_completion() {
        let transport = MockTransport::new(|req| {
            if req.url.contains("first") {
                sleep(Duration::from_millis(150));
                Ok(HttpResponse::ok(svg("first", 100, 10)))
            } else {
                Ok(HttpResponse::ok(svg("second", 100, 10)))
            }
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        let first = output.svg.find("id=\"first\"").unwrap();
        let second = output.svg.find("id=\"second\"").unwrap();
        assert!(first < second);
        assert!(output.svg.contains("height=\"10pt\" x=\"20\" y=\"20\"><g id=\"first\"/>"));
        assert!(output.svg.contains("height=\"10pt\" x=\"20\" y=\"50\"><g id=\"second\"/>"));
    }

    #[test]
    fn test_partial_failure_keeps_survivor() {
        let survivor = svg("second", 80, 20);
        let expected = survivor.clone();
        let transport = MockTransport::new(move |req| {
            if req.url.contains("first") {
                Err(RenderError::Http("connection reset".to_owned()))
            } else {
                Ok(HttpResponse::ok(survivor.as_str()))
            }
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        assert_eq!(output.svg, expected);
        assert_eq!(output.rendered(), 1);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].index, 0);
        assert_eq!(output.errors[0].label, "align");
    }

    #[test]
    fn test_non_svg_response_counts_as_failure() {
        let transport = MockTransport::new(|req| {
            Ok(if req.url.contains("first") {
                HttpResponse::ok("<html>rate limited</html>")
            } else {
                HttpResponse::ok(svg("second", 80, 20))
            })
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        assert_eq!(output.rendered(), 1);
        assert!(matches!(
            output.errors[0].kind,
            RenderError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn test_all_blocks_failed_background_only() {
        let transport = MockTransport::new(|_| Err(RenderError::Http("offline".to_owned())));

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        assert_eq!(output.rendered(), 0);
        assert_eq!(output.errors.len(), 2);
        assert!(output.svg.contains("width=\"40\" height=\"20\""));
        assert_eq!(output.svg.matches("<svg").count(), 1);
    }

    #[test]
    fn test_block_follows_redirect() {
        let transport = MockTransport::new(|req| {
            Ok(if req.url.starts_with("https://latex.example/svg.image") {
                HttpResponse::redirect(302, "https://cdn.example/cached.svg")
            } else {
                HttpResponse::ok(svg("cached", 10, 10))
            })
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new("x^2"))
            .unwrap();

        assert!(output.svg.contains("id=\"cached\""));
        assert_eq!(transport.requests()[1].url, "https://cdn.example/cached.svg");
    }

    #[test]
    fn test_redirect_limit_fails_block() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::redirect(302, "/again")));

        let output = LatexRenderer::new("https://latex.example")
            .max_redirects(2)
            .render(&transport, &SourceDocument::new("x^2"))
            .unwrap();

        assert_eq!(output.rendered(), 0);
        assert!(matches!(
            output.errors[0].kind,
            RenderError::TooManyRedirects { limit: 2 }
        ));
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_all_blocks_in_flight_together() {
        const BLOCKS: usize = 8;
        let barrier = Arc::new(Barrier::new(BLOCKS));
        let transport = MockTransport::new(move |req| {
            // Deadlocks unless every block request is running concurrently.
            barrier.wait();
            let id = (0..BLOCKS)
                .find(|i| req.url.contains(&format!("x_{i}")))
                .unwrap();
            if id == 0 {
                sleep(Duration::from_millis(50));
            }
            Ok(HttpResponse::ok(svg(&format!("b{id}"), 10, 10)))
        });
        let body: String = (0..BLOCKS).map(|i| format!("\\[ x_{i} \\]\n")).collect();
        let source = format!("\\begin{{document}}\n{body}\\end{{document}}");

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(source))
            .unwrap();

        assert_eq!(output.rendered(), BLOCKS);
        assert_eq!(transport.requests().len(), BLOCKS);
        let positions: Vec<usize> = (0..BLOCKS)
            .map(|i| output.svg.find(&format!("id=\"b{i}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_malformed_fragment_reported_as_block_error() {
        let survivor = svg("second", 80, 20);
        let expected = survivor.clone();
        let transport = MockTransport::new(move |req| {
            Ok(if req.url.contains("first") {
                HttpResponse::ok("<svg width=\"10\" height=\"10\"><g></svg>")
            } else {
                HttpResponse::ok(survivor.as_str())
            })
        });

        let output = LatexRenderer::new("https://latex.example")
            .render(&transport, &SourceDocument::new(TWO_ALIGNS))
            .unwrap();

        assert_eq!(output.svg, expected);
        assert_eq!(output.rendered(), 1);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].index, 0);
        assert!(matches!(output.errors[0].kind, RenderError::Compose(_)));
    }
}
