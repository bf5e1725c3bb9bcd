//! Minimal kumi example — a phase-ordered pipeline with logging, auth,
//! routes, and an error handler.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/hello/alice
//!   curl http://localhost:3000/admin/stats
//!   curl -H 'authorization: secret' http://localhost:3000/admin/stats
//!   curl http://localhost:3000/healthz

use kumi::{Ctx, Dispatcher, Error, Flow, Registry, Server, Spec, Status, health};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry = Registry::new();

    // Global middleware: runs for every request, first (phase "log").
    registry.register(Spec::new().name("log").phase("log"), log).unwrap();

    // Path-scoped middleware: only requests under /admin, any method.
    registry
        .register(Spec::new().name("auth").phase("auth").path("/admin"), auth)
        .unwrap();

    // Route handlers (phase "route").
    registry
        .register(
            Spec::new().name("hello").phase("route").method("get").path("/hello/{name}"),
            hello,
        )
        .unwrap();
    registry
        .register(
            Spec::new().name("stats").phase("route").method("get").path("/admin/stats"),
            stats,
        )
        .unwrap();
    registry
        .register(Spec::new().method("get").path("/healthz"), health::liveness)
        .unwrap();
    registry
        .register(Spec::new().method("get").path("/readyz"), health::readiness)
        .unwrap();

    // Turns handler failures into JSON error responses. Forced into the
    // ERROR phase, which always sorts after the phases above.
    registry.register_error_handler(Spec::new().name("errors"), errors).unwrap();

    let app = Dispatcher::new(registry);
    app.set_phase_order(["log", "auth", "route"]);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

async fn log(ctx: Ctx) -> Flow {
    tracing::info!(method = %ctx.method(), path = ctx.path(), "request");
    Flow::Next
}

// Fails the request unless the authorization header is present; the
// failure skips the remaining normal handlers and lands in `errors`.
async fn auth(ctx: Ctx) -> Result<Flow, Error> {
    match ctx.header("authorization") {
        Some("secret") => Ok(Flow::Next),
        _ => Err(Error::handler(Status::Unauthorized, "missing or bad credentials")),
    }
}

async fn hello(ctx: Ctx) -> Flow {
    let name = ctx.param("name").unwrap_or_else(|| "world".to_owned());
    ctx.json(format!(r#"{{"hello":"{name}"}}"#).into_bytes());
    Flow::Done
}

async fn stats(ctx: Ctx) -> Flow {
    ctx.json(br#"{"uptime":"long enough"}"#.to_vec());
    Flow::Done
}

async fn errors(ctx: Ctx, err: Error) -> Flow {
    tracing::warn!(error = %err, "request failed");
    ctx.status(err.status());
    ctx.json(format!(r#"{{"error":"{err}"}}"#).into_bytes());
    Flow::Done
}
