//! Registration specs.
//!
//! A [`Spec`] is the metadata attached to a handler at registration time:
//! an optional name, the phase it runs in, and the path/method scope that
//! decides which requests reach it. All four tags are free-form strings;
//! the single validation rule is that a method scope requires a path scope.

use crate::error::Error;

/// Tags attached to one handler registration.
///
/// ```rust
/// use kumi::Spec;
///
/// // Path-scoped middleware in the `auth` phase:
/// Spec::new().phase("auth").path("/admin");
///
/// // A route handler:
/// Spec::new().name("get-user").phase("route").method("get").path("/users/{id}");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Spec {
    pub(crate) name: Option<String>,
    pub(crate) phase: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) method: Option<String>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the entry. Unnamed entries get a generated name unique within
    /// their registry.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Assigns the entry to a phase. Unset means the default (empty-string)
    /// phase.
    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Scopes the entry to requests under a path prefix, or, combined with
    /// [`method`](Spec::method), to one route.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Scopes the entry to one HTTP method. Requires [`path`](Spec::path).
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Rejects a method scope without a path scope. Runs on every
    /// registration, before the entry enters the registry, so a malformed
    /// spec never surfaces at request time.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.method.is_some() && self.path.is_none() {
            return Err(Error::config("spec has a method but no path"));
        }
        Ok(())
    }
}
