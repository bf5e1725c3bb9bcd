//! # kumi
//!
//! Phase-ordered middleware pipelines for minimal Rust HTTP services.
//!
//! Handlers register independently, tagged with a **phase** (when they
//! run), and optionally a **path** and **method** (which requests they
//! see). The pipeline is assembled from those tags: phases run in the
//! order you configure, entries within a phase run in registration order,
//! and the whole thing is rebuilt lazily whenever a registration or the
//! phase order changes. The result is one deterministic request chain,
//! however scattered the registrations that produced it.
//!
//! ## The contract
//!
//! kumi decides *which* registered handler runs *in what order* for a
//! given request. Everything a reverse proxy already owns — TLS, rate
//! limiting, slow clients, body-size limits — it intentionally ignores.
//!
//! ## The moving parts
//!
//! - [`Registry`] — a live, observable collection of tagged handlers
//! - [`Dispatcher`] — builds the chain on first use, caches it, and drops
//!   the cache when the registry or the phase order changes
//! - [`Chain`] — the concrete ordered chain a request walks through
//! - Reserved phases [`ERROR_PHASE`] and [`FINAL_PHASE`] always sort after
//!   every configured phase, so failure handling and cleanup run last
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kumi::{Ctx, Dispatcher, Error, Flow, Registry, Server, Spec};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!
//!     registry.register(Spec::new().phase("log"), log).unwrap();
//!     registry.register(
//!         Spec::new().phase("route").method("get").path("/hello/{name}"),
//!         hello,
//!     ).unwrap();
//!     registry.register_error_handler(Spec::new(), on_error).unwrap();
//!
//!     let app = Dispatcher::new(registry);
//!     app.set_phase_order(["log", "auth", "route"]);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn log(ctx: Ctx) -> Flow {
//!     tracing::info!(method = %ctx.method(), path = ctx.path(), "request");
//!     Flow::Next
//! }
//!
//! async fn hello(ctx: Ctx) -> Flow {
//!     let name = ctx.param("name").unwrap_or_else(|| "world".to_owned());
//!     ctx.json(format!(r#"{{"hello":"{name}"}}"#).into_bytes());
//!     Flow::Done
//! }
//!
//! async fn on_error(ctx: Ctx, err: Error) -> Flow {
//!     ctx.status(err.status());
//!     ctx.text("something went wrong");
//!     Flow::Done
//! }
//! ```

mod chain;
mod ctx;
mod dispatch;
mod error;
mod handler;
mod method;
mod phase;
mod pipeline;
mod registry;
mod request;
mod response;
mod server;
mod spec;
mod status;

pub mod health;

pub use chain::Chain;
pub use ctx::{Ctx, Flow, IntoFlow};
pub use dispatch::Dispatcher;
pub use error::Error;
pub use handler::{ErrorHandler, Handler};
pub use method::Method;
pub use phase::{ERROR_PHASE, FINAL_PHASE};
pub use pipeline::Mount;
pub use registry::{Entry, Registry, Subscription};
pub use request::Request;
pub use response::Response;
pub use server::Server;
pub use spec::Spec;
pub use status::Status;
