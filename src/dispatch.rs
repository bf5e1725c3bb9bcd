//! The request dispatcher: lazy pipeline build, caching, invalidation.
//!
//! A [`Dispatcher`] owns no handlers of its own. It watches a
//! [`Registry`], and on the first request after any change it takes a
//! snapshot, resolves the phase order, builds a fresh [`Chain`], and caches
//! it. Every request until the next invalidation replays that cached
//! chain.
//!
//! Invalidation happens two ways: explicitly, when the caller replaces the
//! phase order, and implicitly, when the registry notifies of a change.
//! Either way the cached chain and the registry subscription are dropped
//! together; the next request rebuilds and resubscribes.
//!
//! The build-or-reuse path runs under one mutex, so concurrent first
//! requests produce exactly one build. The lock is released before the
//! chain runs; an in-flight request keeps the `Arc` snapshot it started
//! with even if an invalidation lands mid-request.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::chain::Chain;
use crate::ctx::Ctx;
use crate::error::Error;
use crate::phase::{self, order_with_reserved};
use crate::pipeline::{self, Mount};
use crate::registry::{Registry, Subscription};
use crate::request::Request;
use crate::response::Response;

/// The single entry point the HTTP layer drives, mounted once at the
/// application root.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: Registry,
    state: Mutex<DispatchState>,
}

#[derive(Default)]
struct DispatchState {
    /// Caller-supplied phase order; the reserved phases are appended at
    /// resolution time, not stored here.
    order: Vec<String>,
    cached: Option<Arc<Chain>>,
    subscription: Option<Subscription>,
    builds: u64,
}

impl DispatchState {
    fn invalidate(&mut self) {
        self.cached = None;
        // Dropping the subscription cancels it; the next build makes a
        // fresh one.
        self.subscription = None;
    }
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                state: Mutex::new(DispatchState::default()),
            }),
        }
    }

    /// Runs one request through the current pipeline, building it first if
    /// no cached one exists.
    ///
    /// A failed build is not cached: the error is logged, this request gets
    /// a `500`, and the next request retries the build from scratch.
    pub async fn handle(&self, req: Request) -> Response {
        let chain = match self.chain() {
            Ok(chain) => chain,
            Err(err) => {
                error!(error = %err, "pipeline build failed");
                return Response::status_only(err.status());
            }
        };
        chain.run(Ctx::new(req)).await
    }

    /// Replaces the phase order and invalidates the cached pipeline.
    ///
    /// The reserved `ERROR` and `FINAL` phases are always appended after
    /// `names`, whatever `names` contains.
    pub fn set_phase_order<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        state.order = names.into_iter().map(Into::into).collect();
        state.invalidate();
        debug!("phase order replaced, pipeline invalidated");
    }

    /// Drops the cached pipeline and cancels the registry subscription.
    /// The next request rebuilds.
    pub fn invalidate(&self) {
        self.lock().invalidate();
    }

    /// How many times the pipeline has been built. Stable between
    /// invalidations; useful for verifying rebuild behaviour.
    pub fn builds(&self) -> u64 {
        self.lock().builds
    }

    /// Resolves the current phase order against a fresh registry snapshot
    /// and mounts every entry onto `router`, returning it.
    ///
    /// This is the same build the dispatcher runs internally against its
    /// own [`Chain`], exposed for mounting the pipeline onto a different
    /// [`Mount`] implementation. The dispatcher's cache is untouched.
    pub fn build_into<M: Mount>(&self, router: M) -> Result<M, Error> {
        let order = order_with_reserved(&self.lock().order);
        let phases = phase::resolve(&self.inner.registry.snapshot(), &order);
        pipeline::build(phases, router)
    }

    /// Returns the cached chain, building it under the state lock when
    /// absent. Holding the lock across the build is what makes concurrent
    /// first requests produce exactly one build.
    fn chain(&self) -> Result<Arc<Chain>, Error> {
        let mut state = self.lock();
        if let Some(chain) = &state.cached {
            return Ok(Arc::clone(chain));
        }

        let order = order_with_reserved(&state.order);
        let entries = self.inner.registry.snapshot();
        let phases = phase::resolve(&entries, &order);
        let chain = Arc::new(pipeline::build(phases, Chain::new())?);

        state.builds += 1;
        state.cached = Some(Arc::clone(&chain));
        if state.subscription.is_none() {
            // Weak, or the subscription callback would keep the dispatcher
            // alive forever through the registry.
            let weak = Arc::downgrade(&self.inner);
            state.subscription = Some(self.inner.registry.subscribe(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.state.lock().expect("dispatcher state poisoned").invalidate();
                }
            }));
        }
        info!(entries = entries.len(), build = state.builds, "pipeline built");

        Ok(chain)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DispatchState> {
        self.inner.state.lock().expect("dispatcher state poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Flow;
    use crate::method::Method;
    use crate::spec::Spec;

    async fn noop(_ctx: Ctx) -> Flow {
        Flow::Next
    }

    fn get(path: &str) -> Request {
        Request::new(Method::Get, path)
    }

    #[tokio::test]
    async fn pipeline_is_built_lazily_and_reused() {
        let registry = Registry::new();
        registry.register(Spec::new(), noop).unwrap();
        let dispatcher = Dispatcher::new(registry);

        assert_eq!(dispatcher.builds(), 0);
        dispatcher.handle(get("/a")).await;
        dispatcher.handle(get("/b")).await;
        assert_eq!(dispatcher.builds(), 1);
    }

    #[tokio::test]
    async fn replacing_the_phase_order_forces_one_rebuild() {
        let registry = Registry::new();
        registry.register(Spec::new().phase("log"), noop).unwrap();
        let dispatcher = Dispatcher::new(registry);

        dispatcher.handle(get("/")).await;
        assert_eq!(dispatcher.builds(), 1);

        dispatcher.set_phase_order(["log"]);
        dispatcher.handle(get("/")).await;
        dispatcher.handle(get("/")).await;
        assert_eq!(dispatcher.builds(), 2);
    }

    #[tokio::test]
    async fn registry_changes_invalidate_the_cached_pipeline() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());

        dispatcher.handle(get("/")).await;
        assert_eq!(dispatcher.builds(), 1);

        registry.register(Spec::new(), noop).unwrap();
        dispatcher.handle(get("/")).await;
        assert_eq!(dispatcher.builds(), 2);

        let name = registry.register(Spec::new(), noop).unwrap();
        registry.remove(&name);
        dispatcher.handle(get("/")).await;
        assert_eq!(dispatcher.builds(), 3);
    }

    #[tokio::test]
    async fn failed_build_is_retried_not_cached() {
        let registry = Registry::new();
        // Passes registration (path is present) but cannot be mounted.
        registry.register(Spec::new().method("fetch").path("/x"), noop).unwrap();
        let dispatcher = Dispatcher::new(registry.clone());

        assert_eq!(dispatcher.handle(get("/x")).await.status(), 500);
        assert_eq!(dispatcher.builds(), 0);

        // Once the offending entry is gone the next request builds fine.
        let snapshot = registry.snapshot();
        registry.remove(snapshot[0].name());
        assert_eq!(dispatcher.handle(get("/x")).await.status(), 404);
        assert_eq!(dispatcher.builds(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_requests_build_exactly_once() {
        let registry = Registry::new();
        registry.register(Spec::new(), noop).unwrap();
        let dispatcher = Dispatcher::new(registry);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move { dispatcher.handle(get("/")).await });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(dispatcher.builds(), 1);
    }
}
