//! Pipeline assembly: turning ordered phases into mount calls.
//!
//! The builder walks the resolved phases in order and, within each phase,
//! the entries in registration order, and mounts every one onto the
//! supplied router. Its only externally visible effect is that ordered
//! sequence of mount calls; the router handle is returned once every entry
//! is mounted.

use std::str::FromStr;

use crate::error::Error;
use crate::method::Method;
use crate::phase::Phase;
use crate::registry::Entry;

/// The router surface a pipeline is mounted onto.
///
/// [`Chain`](crate::Chain) is the built-in implementation; anything else
/// that can hold scoped handlers in mount order can stand in for it via
/// [`Dispatcher::build_into`](crate::Dispatcher::build_into). Mounted
/// entries expose their tags and are invocable through
/// [`Entry::call`]/[`Entry::call_error`].
pub trait Mount {
    /// Mounts middleware invoked for every request, or, when `path` is
    /// given, for every request under that path prefix regardless of
    /// method.
    fn mount_use(&mut self, path: Option<&str>, entry: &Entry) -> Result<(), Error>;

    /// Mounts a handler invoked only for requests matching `method` and
    /// `path`.
    fn mount_route(&mut self, method: Method, path: &str, entry: &Entry) -> Result<(), Error>;
}

/// Mounts every entry of every phase, in order, onto `router`.
///
/// How an entry is mounted follows from its tags alone; the handler
/// variant plays no part here. A failure (an unparseable method tag, a
/// path the router rejects) aborts the build and surfaces to whoever
/// triggered it.
pub(crate) fn build<M: Mount>(phases: Vec<Phase>, mut router: M) -> Result<M, Error> {
    for phase in phases {
        for entry in phase.entries {
            match (entry.path(), entry.method()) {
                (Some(path), Some(method)) => {
                    let method = Method::from_str(method).map_err(|()| {
                        Error::config(format!(
                            "entry `{}` has unknown method `{method}`",
                            entry.name(),
                        ))
                    })?;
                    router.mount_route(method, path, &entry)?;
                }
                (Some(path), None) => router.mount_use(Some(path), &entry)?,
                (None, None) => router.mount_use(None, &entry)?,
                // Unreachable through registration, which validates the
                // spec before the entry exists.
                (None, Some(_)) => {
                    return Err(Error::config(format!(
                        "entry `{}` has a method but no path",
                        entry.name(),
                    )));
                }
            }
        }
    }
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{Ctx, Flow};
    use crate::phase::{self, order_with_reserved};
    use crate::registry::Registry;
    use crate::spec::Spec;

    async fn noop(_ctx: Ctx) -> Flow {
        Flow::Next
    }

    /// Records the mount-call sequence instead of holding handlers.
    #[derive(Default, Debug)]
    struct RecordingRouter {
        calls: Vec<String>,
    }

    impl Mount for RecordingRouter {
        fn mount_use(&mut self, path: Option<&str>, entry: &Entry) -> Result<(), Error> {
            self.calls.push(match path {
                Some(path) => format!("use {path} {}", entry.name()),
                None => format!("use * {}", entry.name()),
            });
            Ok(())
        }

        fn mount_route(&mut self, method: Method, path: &str, entry: &Entry) -> Result<(), Error> {
            self.calls.push(format!("route {method} {path} {}", entry.name()));
            Ok(())
        }
    }

    fn build_recorded(registry: &Registry, order: &[&str]) -> Result<RecordingRouter, Error> {
        let order = order_with_reserved(
            &order.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>(),
        );
        let phases = phase::resolve(&registry.snapshot(), &order);
        build(phases, RecordingRouter::default())
    }

    #[test]
    fn mounts_follow_phase_order_then_registration_order_with_tag_scoping() {
        let registry = Registry::new();
        registry
            .register(Spec::new().name("route").phase("route"), noop)
            .unwrap();
        registry
            .register(Spec::new().name("auth").phase("auth").path("/hello"), noop)
            .unwrap();
        registry
            .register(
                Spec::new().name("greet").phase("route").method("get").path("/greet"),
                noop,
            )
            .unwrap();
        registry.register(Spec::new().name("log").phase("log"), noop).unwrap();

        let router = build_recorded(&registry, &["log", "auth", "route"]).unwrap();
        assert_eq!(
            router.calls,
            vec![
                "use * log",
                "use /hello auth",
                "use * route",
                "route GET /greet greet",
            ],
        );
    }

    #[test]
    fn error_entries_mount_through_the_same_rules() {
        let registry = Registry::new();
        registry
            .register_error_handler(
                Spec::new().name("boom").path("/api"),
                |_ctx: Ctx, _err: Error| async { Flow::Done },
            )
            .unwrap();
        registry.register(Spec::new().name("log").phase("log"), noop).unwrap();

        let router = build_recorded(&registry, &["log"]).unwrap();
        // ERROR sorts after `log`; the error entry keeps its path scoping.
        assert_eq!(router.calls, vec!["use * log", "use /api boom"]);
    }

    #[test]
    fn unknown_method_tag_fails_the_build() {
        let registry = Registry::new();
        registry
            .register(Spec::new().name("odd").method("fetch").path("/x"), noop)
            .unwrap();
        let err = build_recorded(&registry, &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
