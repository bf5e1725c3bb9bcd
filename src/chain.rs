//! The concrete request chain.
//!
//! A [`Chain`] is an ordered list of scoped steps, built once per pipeline
//! snapshot and replayed for every request. Route scopes use a radix tree
//! per step ([`matchit`]), so route paths support `{name}` parameters the
//! same way plain routes do elsewhere in the ecosystem.
//!
//! Execution walks the steps in mount order. A step runs only if its scope
//! matches the request. While the request is healthy, normal-variant steps
//! run and error-variant steps are skipped; the first handler failure flips
//! that, and the pending error travels forward through matching
//! error-variant steps until one finishes the response or clears it. The
//! chain supplies the fallbacks at the end of the walk: `404` when no
//! handler finished a response, the error's own status when a failure went
//! unclaimed.

use std::collections::HashMap;

use tracing::error;

use crate::ctx::{Ctx, Flow};
use crate::error::Error;
use crate::method::Method;
use crate::pipeline::Mount;
use crate::registry::{Callback, Entry};
use crate::response::Response;
use crate::status::Status;

/// The built-in router the dispatcher mounts pipelines onto.
pub struct Chain {
    steps: Vec<Step>,
}

struct Step {
    name: String,
    scope: Scope,
    callback: Callback,
}

enum Scope {
    /// Every request.
    Global,
    /// Every request under a path prefix, regardless of method.
    Prefix(String),
    /// One method plus one path template.
    Route { method: Method, tree: matchit::Router<()> },
}

impl Scope {
    /// Returns captured path parameters when the scope matches.
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>> {
        match self {
            Self::Global => Some(HashMap::new()),
            Self::Prefix(prefix) => prefix_matches(prefix, path).then(HashMap::new),
            Self::Route { method: want, tree } => {
                if method != *want {
                    return None;
                }
                let matched = tree.at(path).ok()?;
                Some(
                    matched.params.iter()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect(),
                )
            }
        }
    }
}

/// Segment-aware prefix match: `/hello` scopes `/hello` and `/hello/there`
/// but not `/helloworld`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix.trim_end_matches('/')) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

impl Chain {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Runs the request through the chain and produces the response.
    pub async fn run(&self, ctx: Ctx) -> Response {
        let mut pending: Option<Error> = None;

        for step in &self.steps {
            let Some(params) = step.scope.matches(ctx.method(), ctx.path()) else {
                continue;
            };
            if !params.is_empty() {
                ctx.extend_params(params);
            }

            // Normal steps run while the request is healthy, error steps
            // while a failure is propagating; anything else is not this
            // step's turn.
            let fut = match (&step.callback, pending.as_ref()) {
                (Callback::Normal(handler), None) => handler.call(ctx.clone()),
                (Callback::Error(handler), Some(err)) => handler.call(ctx.clone(), err.clone()),
                _ => continue,
            };

            match fut.await {
                // From an error step, `Next` also clears the pending
                // failure; on a healthy request this is a no-op.
                Ok(Flow::Next) => pending = None,
                Ok(Flow::Done) => return ctx.take_response(),
                Err(err) => pending = Some(err),
            }
        }

        if let Some(err) = pending {
            error!(error = %err, "unhandled handler error");
            return Response::status_only(err.status());
        }

        // Nothing claimed the request: the chain's own not-found fallback.
        Response::status_only(Status::NotFound)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Mount for Chain {
    fn mount_use(&mut self, path: Option<&str>, entry: &Entry) -> Result<(), Error> {
        self.steps.push(Step {
            name: entry.name().to_owned(),
            scope: match path {
                Some(path) => Scope::Prefix(path.to_owned()),
                None => Scope::Global,
            },
            callback: entry.callback.clone(),
        });
        Ok(())
    }

    fn mount_route(&mut self, method: Method, path: &str, entry: &Entry) -> Result<(), Error> {
        let mut tree = matchit::Router::new();
        tree.insert(path, ())
            .map_err(|e| Error::config(format!("entry `{}`: invalid route `{path}`: {e}", entry.name())))?;
        self.steps.push(Step {
            name: entry.name().to_owned(),
            scope: Scope::Route { method, tree },
            callback: entry.callback.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_respects_segment_boundaries() {
        assert!(prefix_matches("/hello", "/hello"));
        assert!(prefix_matches("/hello", "/hello/there"));
        assert!(!prefix_matches("/hello", "/helloworld"));
        assert!(!prefix_matches("/hello", "/greet"));
        assert!(prefix_matches("/", "/anything"));
        assert!(prefix_matches("/api/", "/api/users"));
    }

    #[test]
    fn route_scope_requires_method_and_path() {
        let mut tree = matchit::Router::new();
        tree.insert("/users/{id}", ()).unwrap();
        let scope = Scope::Route { method: Method::Get, tree };

        assert!(scope.matches(Method::Post, "/users/7").is_none());
        assert!(scope.matches(Method::Get, "/users").is_none());
        let params = scope.matches(Method::Get, "/users/7").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
    }
}
