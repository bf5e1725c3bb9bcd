//! Per-request context and control flow.
//!
//! Every handler in a pipeline receives the same [`Ctx`] for a given
//! request: the parsed request on the read side, the response under
//! construction on the write side. A handler signals what the pipeline
//! should do next by returning a [`Flow`].
//!
//! `Ctx` is a cheap clone (an `Arc` around shared state). Handlers within
//! one request run strictly one after another, so the response state sits
//! behind a plain mutex with short, synchronous accessors; no lock is ever
//! held across an `await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// What the pipeline should do after a handler returns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Hand the request to the next matching handler.
    ///
    /// Returned from an error handler, `Next` means the error is recovered:
    /// the pipeline resumes the normal chain from this point on.
    Next,
    /// The response on the [`Ctx`] is complete; stop the chain and send it.
    Done,
}

/// Conversion into a handler result.
///
/// Lets infallible handlers return a bare [`Flow`] while fallible ones
/// return `Result<Flow, Error>`:
///
/// ```rust
/// use kumi::{Ctx, Flow};
///
/// async fn stamp(ctx: Ctx) -> Flow {
///     ctx.set_header("x-served-by", "kumi");
///     Flow::Next
/// }
/// ```
pub trait IntoFlow {
    fn into_flow(self) -> Result<Flow, Error>;
}

impl IntoFlow for Result<Flow, Error> {
    fn into_flow(self) -> Result<Flow, Error> { self }
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Result<Flow, Error> { Ok(self) }
}

// ── Ctx ───────────────────────────────────────────────────────────────────────

/// The per-request context shared by every handler in the chain.
#[derive(Clone)]
pub struct Ctx {
    inner: Arc<CtxInner>,
}

struct CtxInner {
    req: Request,
    state: Mutex<CtxState>,
}

struct CtxState {
    params: HashMap<String, String>,
    res: Response,
}

impl Ctx {
    /// Builds the context for one request.
    ///
    /// The serving layer does this for you; it is public so tests and
    /// custom [`Mount`](crate::Mount) routers can drive handlers directly.
    pub fn new(req: Request) -> Self {
        Self {
            inner: Arc::new(CtxInner {
                req,
                state: Mutex::new(CtxState { params: HashMap::new(), res: Response::new() }),
            }),
        }
    }

    // ── Request side ──────────────────────────────────────────────────────────

    pub fn method(&self) -> Method {
        self.inner.req.method()
    }

    pub fn path(&self) -> &str {
        self.inner.req.path()
    }

    pub fn body(&self) -> &[u8] {
        self.inner.req.body()
    }

    /// Case-insensitive request-header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.req.header(name)
    }

    /// Returns a named path parameter captured by the matching route.
    ///
    /// For a route registered at `/users/{id}`, `ctx.param("id")` on a
    /// request to `/users/42` returns `Some("42".to_owned())`.
    pub fn param(&self, key: &str) -> Option<String> {
        self.lock().params.get(key).cloned()
    }

    // ── Response side ─────────────────────────────────────────────────────────

    /// Sets the response status. Accepts [`Status`](crate::Status) or a bare `u16`.
    pub fn status(&self, code: impl Into<u16>) {
        self.lock().res.status = code.into();
    }

    /// Appends a response header.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().res.headers.push((name.into(), value.into()));
    }

    /// Sets a `text/plain` body. The response is sent once a handler
    /// returns [`Flow::Done`].
    pub fn text(&self, body: impl Into<String>) {
        self.set_body("text/plain; charset=utf-8", body.into().into_bytes());
    }

    /// Sets an `application/json` body from pre-serialised bytes.
    ///
    /// kumi sends bytes and does not care how you build them:
    /// `serde_json::to_vec(&value).unwrap()` or
    /// `format!(r#"{{"id":{id}}}"#).into_bytes()` both work.
    pub fn json(&self, body: Vec<u8>) {
        self.set_body("application/json", body);
    }

    fn set_body(&self, content_type: &str, body: Vec<u8>) {
        let mut state = self.lock();
        state.res.headers.push(("content-type".to_owned(), content_type.to_owned()));
        state.res.body = body;
    }

    // ── Pipeline side ─────────────────────────────────────────────────────────

    /// Merges route-captured parameters into the context. The pipeline
    /// calls this when a route scope matches; a custom router matching its
    /// own templates does the same.
    pub fn extend_params(&self, params: HashMap<String, String>) {
        self.lock().params.extend(params);
    }

    /// Takes the accumulated response out of the context, leaving a fresh
    /// empty one behind.
    pub fn take_response(&self) -> Response {
        std::mem::replace(&mut self.lock().res, Response::new())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CtxState> {
        self.inner.state.lock().expect("ctx state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    fn ctx() -> Ctx {
        Ctx::new(Request::new(Method::Get, "/x"))
    }

    #[test]
    fn response_accumulates_across_clones() {
        let a = ctx();
        let b = a.clone();
        a.status(Status::Created);
        b.set_header("location", "/x/1");
        b.json(b"{}".to_vec());

        let res = a.take_response();
        assert_eq!(res.status(), 201);
        assert_eq!(res.header("location"), Some("/x/1"));
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), b"{}");
    }

    #[test]
    fn params_are_visible_after_route_match() {
        let c = ctx();
        c.extend_params([("id".to_owned(), "42".to_owned())].into());
        assert_eq!(c.param("id").as_deref(), Some("42"));
        assert_eq!(c.param("other"), None);
    }
}
