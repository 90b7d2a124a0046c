//! Service descriptors for introspection and diagnostics.

use crate::container::ServiceRegistration;
use crate::ids::RegistrationId;
use crate::key::{Key, TypeInfo};

/// What is registered under one service key.
///
/// Reading descriptors never locks the container.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Container, Lifetime};
///
/// struct Database {
///     url: String,
/// }
/// struct Repository;
///
/// let container = Container::new();
/// container.add_singleton(Database { url: "postgres://localhost".to_string() }).unwrap();
/// container.add_factory(Lifetime::Scoped, |_| Ok(Repository)).unwrap();
/// container.add_named_singleton("config_value", 42u32).unwrap();
///
/// let descriptors = container.descriptors();
///
/// let db = descriptors
///     .iter()
///     .find(|d| d.type_name().contains("Database"))
///     .unwrap();
/// assert_eq!(db.lifestyle, "Singleton");
/// assert!(!db.is_named());
///
/// let config = descriptors.iter().find(|d| d.is_named()).unwrap();
/// assert_eq!(config.service_name(), Some("config_value"));
/// assert_eq!(config.type_name(), "u32");
///
/// let scoped = descriptors.iter().filter(|d| d.lifestyle == "Scoped").count();
/// assert_eq!(scoped, 1);
/// assert!(!container.is_locked());
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key
    pub key: Key,
    /// Name of the lifestyle instances are cached under
    pub lifestyle: &'static str,
    /// Implementation type
    pub implementation: TypeInfo,
    /// Identity of the underlying registration; equal for registrations sharing a builder
    pub registration: RegistrationId,
    /// True for items of a collection
    pub collection_item: bool,
    /// True for registrations the container created for an unregistered type
    pub auto_registered: bool,
}

impl ServiceDescriptor {
    pub(crate) fn from_registration(registration: &ServiceRegistration, collection_item: bool) -> Self {
        Self {
            key: registration.key,
            lifestyle: registration.lifestyle.name(),
            implementation: registration.builder.implementation(),
            registration: registration.builder.id(),
            collection_item,
            auto_registered: registration.builder.is_auto_registered(),
        }
    }

    /// The discriminator of a named service.
    pub fn service_name(&self) -> Option<&'static str> {
        self.key.service_name()
    }

    /// The service type or trait name.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn is_named(&self) -> bool {
        self.key.service_name().is_some()
    }

    pub fn is_trait(&self) -> bool {
        self.key.is_trait()
    }
}
