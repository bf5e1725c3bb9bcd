//! The live handler registry.
//!
//! A [`Registry`] is an ordered, observable collection of handler entries.
//! Registration appends; removal is by name; every change notifies the
//! registered listeners. The pipeline never reads the live collection
//! directly: it takes a [`snapshot`](Registry::snapshot) and resolves from
//! that, so a rebuild always sees one consistent state.

use std::sync::{Arc, Mutex, Weak};

use crate::ctx::{Ctx, Flow};
use crate::error::Error;
use crate::handler::{BoxedErrorHandler, BoxedHandler, ErrorHandler, Handler};
use crate::phase::ERROR_PHASE;
use crate::spec::Spec;

// ── Entries ───────────────────────────────────────────────────────────────────

/// The two handler variants, fixed at registration time.
///
/// Error-variant handlers run only while a failure is propagating through
/// the chain; normal handlers run only while no failure is pending.
#[derive(Clone)]
pub(crate) enum Callback {
    Normal(BoxedHandler),
    Error(BoxedErrorHandler),
}

/// One registered handler plus its tags.
///
/// Immutable once created; it leaves the registry only through
/// [`Registry::remove`].
#[derive(Clone)]
pub struct Entry {
    name: String,
    phase: String,
    path: Option<String>,
    method: Option<String>,
    pub(crate) callback: Callback,
}

impl Entry {
    pub fn name(&self) -> &str { &self.name }
    pub fn phase(&self) -> &str { &self.phase }
    pub fn path(&self) -> Option<&str> { self.path.as_deref() }
    pub fn method(&self) -> Option<&str> { self.method.as_deref() }

    pub fn is_error_handler(&self) -> bool {
        matches!(self.callback, Callback::Error(_))
    }

    /// Runs a normal-variant entry's handler. Returns `None` for an
    /// error-variant entry; variants are fixed at registration and an
    /// error handler has nothing to do on a healthy request.
    pub async fn call(&self, ctx: Ctx) -> Option<Result<Flow, Error>> {
        match &self.callback {
            Callback::Normal(handler) => Some(handler.call(ctx).await),
            Callback::Error(_) => None,
        }
    }

    /// Runs an error-variant entry's handler against the pending failure.
    /// Returns `None` for a normal-variant entry.
    pub async fn call_error(&self, ctx: Ctx, err: Error) -> Option<Result<Flow, Error>> {
        match &self.callback {
            Callback::Error(handler) => Some(handler.call(ctx, err).await),
            Callback::Normal(_) => None,
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

type Listener = Arc<dyn Fn() + Send + Sync + 'static>;

/// An observable, registration-ordered collection of handler [`Entry`]s.
///
/// Clones share the same underlying collection.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<Entry>,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    next_auto_name: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a normal-variant handler. Returns the entry's name, which
    /// is generated when the spec does not carry one.
    ///
    /// Fails if the spec has a `method` tag without a `path` tag; the entry
    /// is not added.
    pub fn register(&self, spec: Spec, handler: impl Handler) -> Result<String, Error> {
        self.insert(spec, None, Callback::Normal(handler.into_boxed_handler()))
    }

    /// Registers an error-variant handler. The entry's phase is forced to
    /// `ERROR` regardless of what the spec says, so it sorts after every
    /// caller-configured phase.
    pub fn register_error_handler(
        &self,
        spec: Spec,
        handler: impl ErrorHandler,
    ) -> Result<String, Error> {
        self.insert(
            spec,
            Some(ERROR_PHASE.to_owned()),
            Callback::Error(handler.into_boxed_error_handler()),
        )
    }

    fn insert(
        &self,
        spec: Spec,
        forced_phase: Option<String>,
        callback: Callback,
    ) -> Result<String, Error> {
        spec.validate()?;

        let mut state = self.lock();
        let name = spec.name.unwrap_or_else(|| {
            state.next_auto_name += 1;
            format!("handler-{}", state.next_auto_name)
        });
        state.entries.push(Entry {
            name: name.clone(),
            phase: forced_phase.or(spec.phase).unwrap_or_default(),
            path: spec.path,
            method: spec.method,
            callback,
        });

        self.notify(state);
        Ok(name)
    }

    /// Removes every entry with the given name. Returns whether anything
    /// was removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.name != name);
        let removed = state.entries.len() != before;
        if removed {
            self.notify(state);
        }
        removed
    }

    /// A registration-ordered snapshot of the current entries.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.lock().entries.clone()
    }

    /// Subscribes to change notifications. The callback fires after every
    /// addition or removal, for as long as the returned [`Subscription`]
    /// is alive.
    pub fn subscribe(&self, on_change: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut state = self.lock();
        state.next_listener_id += 1;
        let id = state.next_listener_id;
        state.listeners.push((id, Arc::new(on_change)));
        Subscription { id, registry: Arc::downgrade(&self.inner) }
    }

    /// Invokes the listeners with the state lock released, so a callback is
    /// free to call back into the registry (cancel its subscription, take a
    /// snapshot).
    fn notify(&self, state: std::sync::MutexGuard<'_, RegistryState>) {
        let listeners: Vec<Listener> =
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
        drop(state);
        for listener in listeners {
            listener();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.inner.state.lock().expect("registry state poisoned")
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// A live registry subscription. Dropping it (or calling
/// [`cancel`](Subscription::cancel)) stops the notifications.
pub struct Subscription {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut state = inner.state.lock().expect("registry state poisoned");
            state.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{Ctx, Flow};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn noop(_ctx: Ctx) -> Flow {
        Flow::Next
    }

    #[test]
    fn unnamed_entries_get_unique_generated_names() {
        let registry = Registry::new();
        let a = registry.register(Spec::new(), noop).unwrap();
        let b = registry.register(Spec::new(), noop).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_spec_never_enters_the_registry() {
        let registry = Registry::new();
        assert!(registry.register(Spec::new().method("get"), noop).is_err());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn error_registration_forces_the_error_phase() {
        let registry = Registry::new();
        registry
            .register_error_handler(Spec::new().phase("route"), |_ctx: Ctx, _err: Error| async {
                Flow::Done
            })
            .unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].phase(), ERROR_PHASE);
        assert!(snapshot[0].is_error_handler());
    }

    #[test]
    fn listeners_fire_on_add_and_remove_until_cancelled() {
        let registry = Registry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let sub = registry.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let name = registry.register(Spec::new(), noop).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(registry.remove(&name));
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // Removing a name that is not there changes nothing and stays quiet.
        assert!(!registry.remove("missing"));
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        sub.cancel();
        registry.register(Spec::new(), noop).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
