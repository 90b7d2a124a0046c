//! Registrations made on demand for services nobody registered.

use std::any::TypeId;
use std::collections::HashMap;

use crate::collection::Registration;
use crate::key::Key;
use crate::plan::Constructor;

/// Supplies a registration for a key that has none.
///
/// Consulted in registration order the first time an unregistered key is
/// resolved. Whatever it returns is registered implicitly; activation failures of
/// such registrations are reported as
/// [`DiError::ImplicitRegistrationFailed`](crate::DiError::ImplicitRegistrationFailed).
pub trait UnregisteredTypeResolver: Send + Sync {
    fn resolve(&self, key: &Key) -> Option<Registration>;
}

impl<F> UnregisteredTypeResolver for F
where
    F: Fn(&Key) -> Option<Registration> + Send + Sync,
{
    fn resolve(&self, key: &Key) -> Option<Registration> {
        self(key)
    }
}

/// Constructors of concrete types that may be created without a registration.
///
/// Only consulted when
/// [`ContainerOptions::resolve_unregistered_concrete_types`](crate::ContainerOptions)
/// is set. Such types are created transient.
#[derive(Default)]
pub(crate) struct ConcreteTypeCatalog {
    constructors: HashMap<TypeId, Constructor>,
}

impl ConcreteTypeCatalog {
    pub(crate) fn insert(&mut self, constructor: Constructor) {
        self.constructors
            .insert(constructor.implementation().id(), constructor);
    }

    pub(crate) fn resolve(&self, key: &Key) -> Option<Registration> {
        match key {
            Key::Type(id, _) => self
                .constructors
                .get(id)
                .cloned()
                .map(Registration::constructor),
            _ => None,
        }
    }
}
