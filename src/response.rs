//! Outgoing HTTP response type.
//!
//! Handlers do not build [`Response`] values directly; they accumulate
//! status, headers, and body on the [`Ctx`](crate::Ctx) and the pipeline
//! produces the final `Response`. This module exists so the serving layer
//! and tests have a concrete value to inspect and write out.

use bytes::Bytes;
use http_body_util::Full;

/// An outgoing HTTP response.
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self { status: 200, headers: Vec::new(), body: Vec::new() }
    }

    /// Response with the given status and no body.
    pub(crate) fn status_only(code: impl Into<u16>) -> Self {
        Self { status: code.into(), headers: Vec::new(), body: Vec::new() }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the hyper-compatible response type.
    ///
    /// A status or header the `http` crate rejects downgrades the response
    /// to an empty `500` rather than panicking in the serve loop.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

        let mut builder = http::Response::builder().status(status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                http::Response::builder()
                    .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::new()))
                    .expect("empty 500 response is always valid")
            })
    }
}
