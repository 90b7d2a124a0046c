//! Resolver traits for service resolution.

use std::any::type_name;
use std::sync::Arc;

use crate::container::ServiceIter;
use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::scope::Disposable;
use crate::traits::{AsyncDispose, Dispose};
use crate::AnyArc;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`Container`](crate::Container), [`Scope`](crate::Scope) and
/// [`ResolverContext`](crate::ResolverContext). Most users should use the
/// [`Resolver`] trait instead, which provides typed methods on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The resolved service wrapped in `Arc<dyn Any>`
    /// * `Err(DiError)` - Not found, cyclic, locked, disposed, activation failure, ...
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc>;

    /// Resolves the collection registered under `key`, lazily and in registration order.
    ///
    /// A key without collection items yields an empty iterator.
    fn resolve_many(&self, key: &Key) -> DiResult<ServiceIter>;

    /// Tracks `disposable` for teardown with the resolver's scope.
    fn register_disposable(&self, disposable: Disposable) -> DiResult<()>;
}

fn downcast_service<T: Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

// trait objects are stored as Arc<Arc<dyn Trait>>
fn downcast_trait<T: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(type_name::<T>()))
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let container = Container::new();
/// container.add_singleton(42usize).unwrap();
/// container.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger)).unwrap();
///
/// assert_eq!(*container.get_required::<usize>(), 42);
/// container.get_required_trait::<dyn Logger>().log("resolved");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    ///
    /// ```
    /// use ferrous_container::{Container, Resolver};
    ///
    /// let container = Container::new();
    /// container.add_singleton("configuration".to_string()).unwrap();
    ///
    /// let config = container.get::<String>().unwrap();
    /// assert_eq!(&*config, "configuration");
    /// ```
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_service(self.resolve_any(&key_of_type::<T>())?)
    }

    /// Resolves a trait service.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(&key_of_trait::<T>())?)
    }

    /// Resolves every item of the collection of `T`, in registration order.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_type::<T>())?
            .map(|item| item.and_then(downcast_service))
            .collect()
    }

    /// Resolves every implementation in the collection of the trait `T`.
    ///
    /// ```
    /// use ferrous_container::{Container, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// struct PluginA;
    /// impl Plugin for PluginA {
    ///     fn name(&self) -> &str { "Plugin A" }
    /// }
    ///
    /// struct PluginB;
    /// impl Plugin for PluginB {
    ///     fn name(&self) -> &str { "Plugin B" }
    /// }
    ///
    /// let container = Container::new();
    /// container.add_trait_implementation::<dyn Plugin>(Arc::new(PluginA)).unwrap();
    /// container.add_trait_implementation::<dyn Plugin>(Arc::new(PluginB)).unwrap();
    ///
    /// let plugins = container.get_all_trait::<dyn Plugin>().unwrap();
    /// assert_eq!(plugins.len(), 2);
    /// assert_eq!(plugins[0].name(), "Plugin A");
    /// assert_eq!(plugins[1].name(), "Plugin B");
    /// ```
    fn get_all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_trait::<T>())?
            .map(|item| item.and_then(downcast_trait))
            .collect()
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", type_name::<T>(), e))
    }

    /// Resolves a trait service, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the trait cannot be resolved.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {}", type_name::<T>(), e))
    }

    /// Resolves a named concrete service type.
    fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        downcast_service(self.resolve_any(&key_of_type::<T>().named(name))?)
    }

    /// Resolves a named concrete service type, panicking on failure.
    fn get_named_required<T: Send + Sync + 'static>(&self, name: &'static str) -> Arc<T> {
        self.get_named::<T>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve named {} ({}): {}", type_name::<T>(), name, e)
        })
    }

    /// Resolves a named trait service.
    fn get_named_trait<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(&key_of_trait::<T>().named(name))?)
    }

    /// Resolves a named trait service, panicking on failure.
    fn get_named_trait_required<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> Arc<T> {
        self.get_named_trait::<T>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve named trait {} ({}): {}", type_name::<T>(), name, e)
        })
    }

    /// Disposes `service` synchronously when the resolver's scope ends.
    ///
    /// Disposal runs in reverse registration order.
    ///
    /// ```
    /// use ferrous_container::{Container, DiResult, Dispose, Lifetime, Resolver};
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct Connection(AtomicBool);
    ///
    /// impl Dispose for Connection {
    ///     fn dispose(&self) -> DiResult<()> {
    ///         self.0.store(true, Ordering::SeqCst);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// struct Handle(Arc<Connection>);
    ///
    /// let container = Container::new();
    /// container
    ///     .add_factory(Lifetime::Scoped, |r| {
    ///         let connection = Arc::new(Connection(AtomicBool::new(false)));
    ///         r.register_disposer(connection.clone())?;
    ///         Ok(Handle(connection))
    ///     })
    ///     .unwrap();
    ///
    /// let scope = container.begin_scope();
    /// let handle = scope.get_required::<Handle>();
    /// scope.dispose().unwrap();
    /// assert!(handle.0 .0.load(Ordering::SeqCst));
    /// ```
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.register_disposable(Disposable::sync(service))
    }

    /// Disposes `service` asynchronously when the resolver's scope ends.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.register_disposable(Disposable::asynchronous(service))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
