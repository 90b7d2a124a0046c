//! The container: registration phase, lock, and resolution.
//!
//! A container starts open. Registrations are staged behind a mutex until the
//! first resolution (or an explicit [`Container::lock`]) freezes them; from then
//! on registration fails with [`DiError::ContainerLocked`] and every read of the
//! frozen registry is lock-free.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::cache::ResolutionCache;
use crate::collection::Registration;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult, LockSite};
use crate::ids::IdGenerator;
use crate::key::Key;
use crate::options::ContainerOptions;
use crate::plan::{ConstructionPlanBuilder, KnownRelationship, Recipe};
use crate::producer::InstanceProducer;
use crate::scope::{Disposable, Scope};
use crate::traits::ResolverCore;
use crate::{AnyArc, ResolverContext};

mod registry;
mod unregistered;

pub(crate) use registry::{Registry, ServiceRegistration};
pub use unregistered::UnregisteredTypeResolver;

type ArenaKey = (&'static str, TypeId, bool);

/// Dependency injection container.
///
/// Cheap to clone; clones share registrations, caches and singletons.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Config {
///     url: String,
/// }
///
/// struct Repository {
///     config: Arc<Config>,
/// }
///
/// let container = Container::new();
/// container.add_singleton(Config { url: "postgres://localhost".into() }).unwrap();
/// container
///     .add_factory(Lifetime::Transient, |r| {
///         Ok(Repository { config: r.get::<Config>()? })
///     })
///     .unwrap();
///
/// let repository = container.get_required::<Repository>();
/// assert_eq!(repository.config.url, "postgres://localhost");
///
/// // the first resolution locked the container
/// assert!(container.is_locked());
/// assert!(container.add_singleton(1u8).is_err());
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    ids: IdGenerator,
    options: ContainerOptions,
    staging: Mutex<Registry>,
    frozen: OnceCell<Registry>,
    cache: ResolutionCache,
    arena: Mutex<HashMap<ArenaKey, Arc<ConstructionPlanBuilder>>>,
    root_scope: Arc<Scope>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        let ids = IdGenerator::new();
        let root_scope = Scope::root(ids.scope(), options.max_dispose_recursion);
        Self {
            inner: Arc::new(ContainerInner {
                ids,
                options,
                staging: Mutex::new(Registry::default()),
                frozen: OnceCell::new(),
                cache: ResolutionCache::new(),
                arena: Mutex::new(HashMap::new()),
                root_scope,
            }),
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Ends the registration phase.
    ///
    /// Idempotent. The first lock, explicit or implicit, records where it happened;
    /// later registration attempts report that site.
    #[track_caller]
    pub fn lock(&self) {
        let site = LockSite::capture();
        self.freeze(site);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.cache.is_locked()
    }

    /// Where the container was locked, once it is.
    pub fn lock_site(&self) -> Option<&LockSite> {
        self.inner.cache.lock_site()
    }

    /// The frozen registry, locking the container if it is still open.
    #[track_caller]
    pub(crate) fn registry(&self) -> &Registry {
        match self.inner.frozen.get() {
            Some(registry) => registry,
            None => self.freeze(LockSite::capture()),
        }
    }

    fn freeze(&self, site: LockSite) -> &Registry {
        self.inner.frozen.get_or_init(|| {
            let mut staging = self.inner.staging.lock();
            tracing::debug!(lock_site = %site, "container locked");
            self.inner.cache.lock(site);
            std::mem::take(&mut *staging)
        })
    }

    /// Runs `apply` against the staged registry, unless the container is locked.
    pub(crate) fn stage<R>(
        &self,
        attempted: impl FnOnce() -> String,
        apply: impl FnOnce(&mut Registry) -> R,
    ) -> DiResult<R> {
        let mut staging = self.inner.staging.lock();
        self.inner.cache.ensure_open(attempted)?;
        Ok(apply(&mut staging))
    }

    /// Reads the registry in either phase without locking the container.
    pub(crate) fn inspect<R>(&self, read: impl FnOnce(&Registry) -> R) -> R {
        if let Some(registry) = self.inner.frozen.get() {
            return read(registry);
        }
        let staging = self.inner.staging.lock();
        match self.inner.frozen.get() {
            Some(registry) => read(registry),
            None => read(&staging),
        }
    }

    /// The scope that owns singletons.
    pub(crate) fn root_scope(&self) -> &Scope {
        &self.inner.root_scope
    }

    /// Turns a public registration into one bound to `key`.
    ///
    /// Constructor recipes without per-registration settings share one builder per
    /// lifestyle and implementation, so every service they are registered under
    /// sees the same cached instance.
    pub(crate) fn materialize(
        &self,
        key: Key,
        registration: Registration,
        auto_registered: bool,
    ) -> ServiceRegistration {
        let Registration {
            recipe,
            lifestyle,
            disposability,
            suppress_disposal,
            overrides,
            suppressed,
            cast,
        } = registration;

        let shareable = matches!(recipe, Recipe::Constructor(_))
            && overrides.is_empty()
            && suppressed.is_empty()
            && !suppress_disposal;
        let arena_key = (lifestyle.name(), recipe.implementation().id(), auto_registered);
        let build = || {
            let builder = ConstructionPlanBuilder::new(self.inner.ids.registration(), recipe)
                .with_disposability(disposability)
                .suppress_disposal(suppress_disposal)
                .with_overrides(overrides)
                .with_suppressed(suppressed);
            Arc::new(if auto_registered {
                builder.auto_registered()
            } else {
                builder
            })
        };
        let builder = if shareable {
            self.inner
                .arena
                .lock()
                .entry(arena_key)
                .or_insert_with(build)
                .clone()
        } else {
            build()
        };

        ServiceRegistration {
            key,
            builder,
            lifestyle,
            cast,
        }
    }

    fn new_producer(&self, registration: &ServiceRegistration) -> Arc<InstanceProducer> {
        Arc::new(InstanceProducer::new(
            self.inner.ids.producer(),
            registration.key,
            registration.builder.clone(),
            registration.lifestyle.clone(),
            registration.cast.clone(),
        ))
    }

    /// The root producer for `key`, or `None` when nothing can produce it.
    pub(crate) fn root_producer(&self, key: &Key) -> DiResult<Option<Arc<InstanceProducer>>> {
        self.inner
            .cache
            .get_or_build(key, || self.build_root_producer(key))
    }

    fn build_root_producer(&self, key: &Key) -> DiResult<Option<Arc<InstanceProducer>>> {
        let registry = self.registry();
        if let Some(registration) = registry.services.get(key) {
            return Ok(Some(self.new_producer(registration)));
        }

        let implicit = registry
            .unregistered
            .iter()
            .find_map(|resolver| resolver.resolve(key))
            .or_else(|| {
                if self.inner.options.resolve_unregistered_concrete_types {
                    registry.catalog.resolve(key)
                } else {
                    None
                }
            });
        Ok(implicit.map(|registration| {
            tracing::debug!(service = %key, "registering unregistered service implicitly");
            self.new_producer(&self.materialize(*key, registration, true))
        }))
    }

    /// Resolves `key` for a request made in `scope` at `depth`.
    #[track_caller]
    pub(crate) fn resolve_at(&self, key: &Key, scope: Option<&Scope>, depth: usize) -> DiResult<AnyArc> {
        let max = self.inner.options.max_resolution_depth;
        if depth > max {
            return Err(DiError::DepthExceeded(max));
        }
        let registry = match self.inner.frozen.get() {
            Some(registry) => registry,
            None => self.freeze(LockSite::capture().triggered_by(key.display_name())),
        };

        let ambient;
        let scope = match scope {
            Some(scope) => Some(scope),
            None => {
                ambient = registry.locator.current();
                ambient.as_deref()
            }
        };

        tracing::trace!(service = %key, depth, scope = ?scope.map(Scope::id), "resolving");
        let observers = &registry.observers;
        if !observers.has_observers() {
            return self.produce(key, scope, depth);
        }
        observers.resolving(key);
        let started = Instant::now();
        let result = self.produce(key, scope, depth);
        match &result {
            Ok(_) => observers.resolved(key, started.elapsed()),
            Err(err) => observers.resolution_failed(key, err),
        }
        result
    }

    fn produce(&self, key: &Key, scope: Option<&Scope>, depth: usize) -> DiResult<AnyArc> {
        let producer = self
            .root_producer(key)?
            .ok_or(DiError::NotFound(key.display_name()))?;
        producer.get_instance(&ResolverContext::new(self, scope, depth))
    }

    /// Lazily resolves every item registered in the collection `key`.
    #[track_caller]
    pub(crate) fn iterate_at(&self, key: &Key, scope: Option<&Scope>, depth: usize) -> DiResult<ServiceIter> {
        let max = self.inner.options.max_resolution_depth;
        if depth > max {
            return Err(DiError::DepthExceeded(max));
        }
        let registry = match self.inner.frozen.get() {
            Some(registry) => registry,
            None => self.freeze(LockSite::capture().triggered_by(key.display_name())),
        };
        let producers = self.inner.cache.get_or_build_collection(key, || {
            Ok(registry
                .collections
                .get(key)
                .map(|items| items.iter().map(|item| self.new_producer(item)).collect())
                .unwrap_or_default())
        })?;
        let scope = match scope {
            Some(scope) => scope.arc(),
            None => registry.locator.current(),
        };
        Ok(ServiceIter {
            container: self.clone(),
            scope,
            producers,
            next: 0,
            depth,
        })
    }

    /// Resolves `key` without a scope, using the ambient scope if a locator provides one.
    #[track_caller]
    pub fn resolve(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolve_at(key, None, 0)
    }

    /// Starts a new top-level scope.
    pub fn begin_scope(&self) -> Arc<Scope> {
        self.begin_scope_within(None)
    }

    pub(crate) fn begin_scope_within(&self, parent: Option<Arc<Scope>>) -> Arc<Scope> {
        Scope::new(
            self.inner.ids.scope(),
            self.clone(),
            parent,
            self.inner.options.max_dispose_recursion,
        )
    }

    /// The root producer for `key`. Locks the container.
    #[track_caller]
    pub fn producer(&self, key: &Key) -> DiResult<Option<Arc<InstanceProducer>>> {
        self.registry();
        self.root_producer(key)
    }

    /// Dependencies of `key` discovered by building its plan.
    #[track_caller]
    pub fn relationships(&self, key: &Key) -> DiResult<Vec<KnownRelationship>> {
        let producer = self
            .producer(key)?
            .ok_or(DiError::NotFound(key.display_name()))?;
        producer.build_plan(self)?;
        Ok(producer.relationships())
    }

    /// Builds and compiles every registered service without creating instances.
    ///
    /// Locks the container. Returns the first failure in registration order.
    #[track_caller]
    pub fn verify(&self) -> DiResult<()> {
        let registry = self.registry();
        for registration in registry.services() {
            if let Some(producer) = self.root_producer(&registration.key)? {
                producer.validate(self)?;
            }
        }
        for key in registry.collection_keys() {
            let iter = self.iterate_at(key, None, 0)?;
            for producer in iter.producers.iter() {
                producer.validate(self)?;
            }
        }
        tracing::debug!(services = registry.services.len(), "container verified");
        Ok(())
    }

    /// What is registered, in registration order; collections come last.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.inspect(|registry| {
            let singles = registry.services().map(|r| ServiceDescriptor::from_registration(r, false));
            let items = registry
                .collections
                .values()
                .flatten()
                .map(|r| ServiceDescriptor::from_registration(r, true));
            singles.chain(items).collect()
        })
    }

    /// Disposes the root scope and with it every singleton.
    pub fn dispose(&self) -> DiResult<()> {
        self.inner.root_scope.dispose()
    }

    pub async fn dispose_async(&self) -> DiResult<()> {
        self.inner.root_scope.dispose_async().await
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.root_scope.is_disposed()
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolve_at(key, None, 0)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<ServiceIter> {
        self.iterate_at(key, None, 0)
    }

    /// Tracks `disposable` until the container is disposed.
    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        self.inner.root_scope.register_for_disposal(disposable)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("locked", &self.is_locked())
            .field("cached_producers", &self.inner.cache.len())
            .field("root_scope", &self.inner.root_scope.id())
            .finish()
    }
}

/// Lazily resolves the items of a collection, in registration order.
///
/// Each call to `next` resolves one item, so a failing item does not prevent
/// the ones before it from being used.
pub struct ServiceIter {
    container: Container,
    scope: Option<Arc<Scope>>,
    producers: Arc<[Arc<InstanceProducer>]>,
    next: usize,
    depth: usize,
}

impl Iterator for ServiceIter {
    type Item = DiResult<AnyArc>;

    fn next(&mut self) -> Option<Self::Item> {
        let producer = self.producers.get(self.next)?.clone();
        self.next += 1;
        let ctx = ResolverContext::new(&self.container, self.scope.as_deref(), self.depth);
        Some(producer.get_instance(&ctx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.producers.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ServiceIter {}

impl fmt::Debug for ServiceIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceIter")
            .field("remaining", &(self.producers.len() - self.next))
            .field("scope", &self.scope.as_ref().map(|s| s.id()))
            .finish()
    }
}
