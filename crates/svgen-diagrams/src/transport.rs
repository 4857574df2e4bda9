//! HTTP transport for rendering services.
//!
//! [`Transport`] is the seam between pipelines and the network. The
//! production implementation is [`UreqTransport`]; unit tests swap in an
//! in-memory mock.
//!
//! Automatic redirects are disabled on the agent so that
//! [`get_following_redirects`] can count hops and enforce its own limit.

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::consts::{DEFAULT_TIMEOUT, EXCERPT_LEN};
use crate::error::RenderError;

/// HTTP method used by a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body for POST requests.
    pub body: Option<String>,
}

impl HttpRequest {
    /// GET request without a body.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    /// POST request with a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body.into()),
        }
    }
}

/// Response with the body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Value of the `Location` header, if any.
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// 200 response with the given body.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            location: None,
            body: body.into(),
        }
    }

    /// Redirect response pointing at `location`.
    #[must_use]
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            body: String::new(),
        }
    }

    /// Whether the status asks the client to re-issue the request elsewhere.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// Sends requests to a rendering service.
///
/// Implementations must be shareable across threads; the LaTeX pipeline
/// issues its block requests in parallel through one transport.
pub trait Transport: Send + Sync {
    /// Send a request and read the whole response body.
    ///
    /// Non-success statuses are returned as responses, not errors.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RenderError>;
}

/// [`Transport`] backed by a pooled `ureq` agent.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Create a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: create_agent(timeout),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Create HTTP agent with the specified timeout and redirects disabled.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .max_redirects(0)
        .max_redirects_will_error(false)
        .build()
        .into()
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RenderError> {
        let result = match (request.method, request.body.as_deref()) {
            (Method::Get, _) => self.agent.get(&request.url).call(),
            (Method::Post, body) => self
                .agent
                .post(&request.url)
                .header("Content-Type", "application/json")
                .send(body.unwrap_or_default().as_bytes()),
        };
        let response = result.map_err(|e| RenderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| RenderError::Http(e.to_string()))?;

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}

/// Issue a GET and follow redirects, at most `max_redirects` hops.
///
/// # Errors
///
/// Returns [`RenderError::TooManyRedirects`] when the chain is longer than
/// the limit, [`RenderError::MissingLocation`] for a redirect without a
/// target, and any transport error unchanged.
pub fn get_following_redirects(
    transport: &dyn Transport,
    url: &str,
    max_redirects: usize,
) -> Result<HttpResponse, RenderError> {
    let mut current = url.to_owned();
    let mut hops = 0;

    loop {
        let response = transport.send(&HttpRequest::get(current.as_str()))?;
        if !response.is_redirect() {
            return Ok(response);
        }
        if hops == max_redirects {
            return Err(RenderError::TooManyRedirects {
                limit: max_redirects,
            });
        }
        let location = response
            .location
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or(RenderError::MissingLocation {
                status: response.status,
            })?;
        let next = resolve_location(&current, location);
        debug!(status = response.status, from = %current, to = %next, "Following redirect");
        current = next;
        hops += 1;
    }
}

/// Resolve a `Location` header value against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    if location.contains("://") {
        return location.to_owned();
    }

    let (scheme, rest) = base.split_once("://").unwrap_or(("https", base));
    if let Some(network_path) = location.strip_prefix("//") {
        return format!("{scheme}://{network_path}");
    }

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let origin = format!("{scheme}://{}", &rest[..authority_end]);
    if location.starts_with('/') {
        return format!("{origin}{location}");
    }

    let path = &rest[authority_end..];
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
    format!("{origin}{dir}{location}")
}

/// Accept a response only if it is a 200 carrying SVG markup.
///
/// # Errors
///
/// Returns [`RenderError::Status`] for any other status and
/// [`RenderError::InvalidResponse`] when the body has no `<svg` tag.
pub fn validate_svg(response: HttpResponse) -> Result<String, RenderError> {
    if response.status != 200 {
        return Err(RenderError::Status {
            status: response.status,
            excerpt: excerpt(&response.body),
        });
    }
    if !response.body.contains("<svg") {
        return Err(RenderError::InvalidResponse {
            status: response.status,
            excerpt: excerpt(&response.body),
        });
    }
    Ok(response.body)
}

/// First [`EXCERPT_LEN`] characters of a body for diagnostics.
pub(crate) fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(EXCERPT_LEN).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
