//! Disposal traits for resource cleanup.

use crate::error::DiResult;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections). Instances are disposed in reverse creation order when the scope
/// that tracks them ends. A failing `dispose` does not stop the teardown; the error is
/// reported once every tracked instance has had its turn.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, DiResult, Dispose, Lifetime, Resolver};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> DiResult<()> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container
///     .add_disposable_factory(Lifetime::Scoped, |_| {
///         Ok(Cache { name: "user_cache".to_string() })
///     })
///     .unwrap();
///
/// let scope = container.begin_scope();
/// let _cache = scope.get_required::<Cache>();
/// scope.dispose().unwrap();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> DiResult<()>;
}

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that require async teardown (e.g., graceful connection
/// shutdown, async I/O cleanup). Only [`Scope::dispose_async`](crate::Scope::dispose_async)
/// drives these; synchronous disposal reports
/// [`DiError::AsyncDisposalRequired`](crate::DiError::AsyncDisposalRequired) for them.
///
/// # Examples
///
/// ```
/// use ferrous_container::{AsyncDispose, DiResult};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> DiResult<()> {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> DiResult<()>;
}
