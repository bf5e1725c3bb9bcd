//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. kumi answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them like any other route handler:
//!
//! ```rust
//! use kumi::{health, Registry, Spec};
//!
//! let registry = Registry::new();
//! registry.register(Spec::new().method("get").path("/healthz"), health::liveness).unwrap();
//! registry.register(Spec::new().method("get").path("/readyz"), health::readiness).unwrap();
//! ```
//!
//! Override `readiness` with your own handler if you need to gate on
//! dependency availability (database connections, downstream services).

use crate::ctx::{Ctx, Flow};

/// Kubernetes liveness probe handler.
///
/// Always `200 OK` with body `"ok"`. If the process can respond to HTTP at
/// all, it is alive; this handler intentionally has no dependencies.
pub async fn liveness(ctx: Ctx) -> Flow {
    ctx.text("ok");
    Flow::Done
}

/// Kubernetes readiness probe handler (default implementation).
///
/// Always `200 OK` with body `"ready"`. Replace it with your own handler if
/// your application needs a warm-up period or must verify dependency
/// health before accepting traffic.
pub async fn readiness(ctx: Ctx) -> Flow {
    ctx.text("ready");
    Flow::Done
}
