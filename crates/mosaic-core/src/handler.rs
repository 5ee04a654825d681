//! Backend handler contract and connection lifecycle.
//!
//! A [`GraphqlHandler`] contributes query and mutation fields to the
//! per-request schema. Each request opens one connection per handler; the
//! connection is handed back to the handler when it builds its field set,
//! so field definitions may close over it.
//!
//! Handlers are stored behind the object-safe [`DynHandler`] trait, which
//! erases the connection type. Every opened connection and its [`Release`]
//! action live in a [`ReleaseGuard`] until the response is produced.

use crate::context::RequestContext;
use crate::error::ConnectError;
use crate::schema::FieldSet;
use crate::types::BoxFuture;
use std::any::Any;
use std::fmt;

/// Action run once the request no longer needs a backend connection.
pub struct Release(Box<dyn FnOnce() + Send>);

impl Release {
    /// Wraps a closure to run on release.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// A release action that does nothing.
    pub fn noop() -> Self {
        Self(Box::new(|| {}))
    }

    /// Runs the action.
    pub fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Release")
    }
}

/// A backend that contributes fields to the aggregated schema.
///
/// `F` is the query engine's field definition type.
///
/// # Example
///
/// ```
/// use mosaic_core::{ConnectError, FieldSet, GraphqlHandler, Release, RequestContext};
/// use mosaic_core::types::BoxFuture;
///
/// struct Users;
///
/// impl GraphqlHandler<&'static str> for Users {
///     type Connection = String;
///
///     fn name(&self) -> &str {
///         "users"
///     }
///
///     fn open_connection<'a>(
///         &'a self,
///         _ctx: &'a RequestContext,
///     ) -> BoxFuture<'a, Result<(String, Release), ConnectError>> {
///         Box::pin(async { Ok(("users:50051".to_string(), Release::noop())) })
///     }
///
///     fn query_fields(&self, _conn: Option<&String>) -> FieldSet<&'static str> {
///         FieldSet::new().with("user", "User")
///     }
///
///     fn mutation_fields(&self, _conn: Option<&String>) -> FieldSet<&'static str> {
///         FieldSet::new()
///     }
/// }
/// ```
pub trait GraphqlHandler<F>: Send + Sync + 'static {
    /// Live backend connection opened per request.
    type Connection: Send + Sync + 'static;

    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Opens a connection scoped to the request.
    fn open_connection<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<(Self::Connection, Release), ConnectError>>;

    /// Query fields contributed by this handler.
    ///
    /// `conn` is `None` during registration-time validation.
    fn query_fields(&self, conn: Option<&Self::Connection>) -> FieldSet<F>;

    /// Mutation fields contributed by this handler.
    ///
    /// `conn` is `None` during registration-time validation.
    fn mutation_fields(&self, conn: Option<&Self::Connection>) -> FieldSet<F>;
}

/// A connection whose concrete type has been erased.
pub type ErasedConnection = Box<dyn Any + Send + Sync>;

/// Object-safe form of [`GraphqlHandler`].
///
/// Implemented for every `GraphqlHandler`; registries hold
/// `Box<dyn DynHandler<F>>`.
pub trait DynHandler<F>: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Opens a connection and erases its type.
    fn open<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<(ErasedConnection, Release), ConnectError>>;

    /// Query fields, given a connection previously returned by [`DynHandler::open`].
    fn query_fields(&self, conn: Option<&ErasedConnection>) -> FieldSet<F>;

    /// Mutation fields, given a connection previously returned by [`DynHandler::open`].
    fn mutation_fields(&self, conn: Option<&ErasedConnection>) -> FieldSet<F>;
}

impl<F, H> DynHandler<F> for H
where
    H: GraphqlHandler<F>,
{
    fn name(&self) -> &str {
        GraphqlHandler::name(self)
    }

    fn open<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<(ErasedConnection, Release), ConnectError>> {
        Box::pin(async move {
            let (conn, release) = self.open_connection(ctx).await?;
            Ok((Box::new(conn) as ErasedConnection, release))
        })
    }

    fn query_fields(&self, conn: Option<&ErasedConnection>) -> FieldSet<F> {
        GraphqlHandler::query_fields(self, downcast::<H::Connection>(conn))
    }

    fn mutation_fields(&self, conn: Option<&ErasedConnection>) -> FieldSet<F> {
        GraphqlHandler::mutation_fields(self, downcast::<H::Connection>(conn))
    }
}

fn downcast<C: 'static>(conn: Option<&ErasedConnection>) -> Option<&C> {
    conn.and_then(|c| (**c).downcast_ref::<C>())
}

/// Request-scoped owner of opened connections and their release actions.
///
/// Releases run exactly once: either through [`ReleaseGuard::release`] or
/// when the guard is dropped (error, timeout, cancellation, unwinding).
/// Connections are dropped first, then release actions run in reverse
/// opening order.
#[derive(Default)]
pub struct ReleaseGuard {
    connections: Vec<ErasedConnection>,
    releases: Vec<Release>,
}

impl ReleaseGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a connection and its release action.
    pub fn push(&mut self, conn: ErasedConnection, release: Release) {
        self.connections.push(conn);
        self.releases.push(release);
    }

    /// Connections in opening order.
    pub fn connections(&self) -> &[ErasedConnection] {
        &self.connections
    }

    /// Number of held connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if nothing has been opened.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Releases everything now.
    pub fn release(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        if self.releases.is_empty() {
            return;
        }
        tracing::debug!(count = self.releases.len(), "releasing backend connections");
        self.connections.clear();
        while let Some(release) = self.releases.pop() {
            release.run();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for ReleaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseGuard")
            .field("connections", &self.connections.len())
            .finish()
    }
}
