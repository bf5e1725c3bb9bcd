//! Handler traits and type erasure.
//!
//! # How async handlers are stored
//!
//! A pipeline holds handlers of *different* concrete types in one ordered
//! list. Rust collections can only hold one concrete type, so each handler
//! is hidden behind a trait object (`dyn ErasedHandler`) and stored
//! uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn log(ctx: Ctx) -> Result<Flow, Error> { … }   ← user writes this
//!        ↓ registry.register(spec, log)
//! log.into_boxed_handler()                              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(log))                              ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time                    ← one vtable dispatch
//!        ↓
//! Box::pin(async { log(ctx).await.into_flow() })        ← BoxFuture
//! ```
//!
//! Error-variant handlers get the same treatment through a parallel pair of
//! traits; they take the pending [`Error`] as a second argument. Which
//! variant an entry is gets recorded at registration, never inferred from
//! the function's shape at call time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::ctx::{Ctx, Flow, IntoFlow};
use crate::error::Error;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to a handler result.
///
/// `Pin<Box<…>>` because the runtime must be able to poll the future
/// in-place; `Send + 'static` so tokio may move it across threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Flow, Error>> + Send + 'static>>;

/// Internal dispatch interface for normal handlers.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Ctx) -> BoxFuture;
}

/// Internal dispatch interface for error-variant handlers.
#[doc(hidden)]
pub trait ErasedErrorHandler {
    fn call(&self, ctx: Ctx, err: Error) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

#[doc(hidden)]
pub type BoxedErrorHandler = Arc<dyn ErasedErrorHandler + Send + Sync + 'static>;

// ── Public handler traits ─────────────────────────────────────────────────────

/// Implemented for every valid normal-variant handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Ctx) -> impl IntoFlow
/// ```
///
/// i.e. returning either `Flow` or `Result<Flow, Error>`.
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// Implemented for every valid error-variant handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Ctx, err: Error) -> impl IntoFlow
/// ```
///
/// Error handlers only run once an earlier handler has failed; `err` is the
/// pending failure. Returning [`Flow::Next`] clears it and resumes the
/// normal chain, [`Flow::Done`] sends the response on the ctx, and a new
/// `Err` replaces the pending failure.
pub trait ErrorHandler: private::SealedError + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_error_handler(self) -> BoxedErrorHandler;
}

/// The sealing module. Because these traits are private, external crates
/// cannot name them and therefore cannot implement the handler traits on
/// their own types.
mod private {
    pub trait Sealed {}
    pub trait SealedError {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

impl<F, Fut, R> private::SealedError for F
where
    F: Fn(Ctx, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
}

impl<F, Fut, R> ErrorHandler for F
where
    F: Fn(Ctx, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn into_boxed_error_handler(self) -> BoxedErrorHandler {
        Arc::new(FnErrorHandler(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Newtype that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Ctx) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn call(&self, ctx: Ctx) -> BoxFuture {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_flow() })
    }
}

struct FnErrorHandler<F>(F);

impl<F, Fut, R> ErasedErrorHandler for FnErrorHandler<F>
where
    F: Fn(Ctx, Error) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoFlow + Send + 'static,
{
    fn call(&self, ctx: Ctx, err: Error) -> BoxFuture {
        let fut = (self.0)(ctx, err);
        Box::pin(async move { fut.await.into_flow() })
    }
}
