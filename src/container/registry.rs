//! Registration storage.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::key::Key;
use crate::lifestyle::Lifestyle;
use crate::observer::Observers;
use crate::plan::{
    BindingPolicy, ClosureCompiler, ConstructionPlanBuilder, DeclaredBindings, Initializer,
    PlanCompiler, PlanInterceptor,
};
use crate::producer::ServiceCast;
use crate::scope::{NoAmbientScope, ScopeLocator};

use super::unregistered::{ConcreteTypeCatalog, UnregisteredTypeResolver};

/// A service key bound to a builder under a lifestyle.
#[derive(Clone)]
pub(crate) struct ServiceRegistration {
    pub(crate) key: Key,
    pub(crate) builder: Arc<ConstructionPlanBuilder>,
    pub(crate) lifestyle: Arc<dyn Lifestyle>,
    pub(crate) cast: Option<ServiceCast>,
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("key", &self.key)
            .field("registration", &self.builder.id())
            .field("lifestyle", &self.lifestyle.name())
            .finish()
    }
}

/// Everything configured during the registration phase.
///
/// Mutable until the container locks, then frozen and read without locking.
pub(crate) struct Registry {
    pub(crate) services: HashMap<Key, ServiceRegistration>,
    /// Keys of `services` in first-registration order.
    pub(crate) order: Vec<Key>,
    pub(crate) collections: HashMap<Key, Vec<ServiceRegistration>>,
    pub(crate) interceptors: Vec<Arc<dyn PlanInterceptor>>,
    pub(crate) initializers: Vec<Initializer>,
    pub(crate) unregistered: Vec<Arc<dyn UnregisteredTypeResolver>>,
    pub(crate) catalog: ConcreteTypeCatalog,
    pub(crate) observers: Observers,
    pub(crate) binding: Arc<dyn BindingPolicy>,
    pub(crate) compiler: Arc<dyn PlanCompiler>,
    pub(crate) locator: Arc<dyn ScopeLocator>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            services: HashMap::new(),
            order: Vec::new(),
            collections: HashMap::new(),
            interceptors: Vec::new(),
            initializers: Vec::new(),
            unregistered: Vec::new(),
            catalog: ConcreteTypeCatalog::default(),
            observers: Observers::default(),
            binding: Arc::new(DeclaredBindings),
            compiler: Arc::new(ClosureCompiler),
            locator: Arc::new(NoAmbientScope),
        }
    }
}

impl Registry {
    /// Binds `registration.key`; a later registration replaces an earlier one.
    pub(crate) fn insert(&mut self, registration: ServiceRegistration) {
        let key = registration.key;
        if let Some(previous) = self.services.insert(key, registration) {
            tracing::debug!(service = %key, replaced = %previous.builder.id(), "registration replaced");
        } else {
            self.order.push(key);
        }
    }

    /// Appends to the collection registered under `registration.key`.
    pub(crate) fn push_collection_item(&mut self, registration: ServiceRegistration) {
        self.collections
            .entry(registration.key)
            .or_default()
            .push(registration);
    }

    /// Single registrations in registration order.
    pub(crate) fn services(&self) -> impl Iterator<Item = &ServiceRegistration> {
        self.order.iter().filter_map(|key| self.services.get(key))
    }

    pub(crate) fn collection_keys(&self) -> impl Iterator<Item = &Key> {
        self.collections.keys()
    }
}
