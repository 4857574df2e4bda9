//! Mock transport for testing.
//!
//! Provides [`MockTransport`] for exercising pipelines without network access.

use std::sync::Mutex;

use crate::error::RenderError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, RenderError> + Send + Sync;

/// Transport that answers every request with a handler closure and records
/// what was sent.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock that answers with `handler`.
    #[must_use]
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, RenderError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RenderError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}
