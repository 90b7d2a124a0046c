//! Service identifiers for the dependency injection container.

use std::any::TypeId;
use std::fmt;

/// Key for service storage and lookup.
///
/// A key identifies the abstract service a caller asks for. Concrete types are
/// keyed by `TypeId`; trait objects by their type name, since `dyn Trait` is
/// resolved through the `Arc<dyn Trait>` it is stored as. The named variants
/// carry a discriminator so several registrations can target the same
/// abstract type.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Container, Resolver, Key};
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
/// container.add_singleton(42u32).unwrap();
/// container.add_named_singleton("config_port", 8080u32).unwrap();
/// container.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger)).unwrap();
///
/// assert_eq!(*container.get_required::<u32>(), 42);
/// assert_eq!(*container.get_named_required::<u32>("config_port"), 8080);
/// container.get_required_trait::<dyn Logger>().log("resolved");
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait object key, by trait name
    Trait(&'static str),
    /// Concrete type key with a discriminator
    TypeNamed(TypeId, &'static str, &'static str),
    /// Trait object key with a discriminator
    TraitNamed(&'static str, &'static str),
}

impl Key {
    /// Get the type or trait name for display
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_container::Key;
    /// use std::any::TypeId;
    ///
    /// let type_key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    /// assert_eq!(type_key.display_name(), "alloc::string::String");
    ///
    /// let named_key = Key::TypeNamed(TypeId::of::<u32>(), "u32", "port");
    /// assert_eq!(named_key.display_name(), "u32");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
            Key::TypeNamed(_, name, _) => name,
            Key::TraitNamed(name, _) => name,
        }
    }

    /// Get the discriminator for named services, or None for unnamed services
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) | Key::Trait(_) => None,
            Key::TypeNamed(_, _, name) => Some(name),
            Key::TraitNamed(_, name) => Some(name),
        }
    }

    /// The `TypeId` for concrete-type keys.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Key::Type(id, _) | Key::TypeNamed(id, _, _) => Some(*id),
            Key::Trait(_) | Key::TraitNamed(_, _) => None,
        }
    }

    /// True when the key names a trait object.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_) | Key::TraitNamed(_, _))
    }

    /// The same abstract type with `name` as discriminator.
    pub fn named(&self, name: &'static str) -> Key {
        match *self {
            Key::Type(id, ty) | Key::TypeNamed(id, ty, _) => Key::TypeNamed(id, ty, name),
            Key::Trait(tr) | Key::TraitNamed(tr, _) => Key::TraitNamed(tr, name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service_name() {
            Some(name) => write!(f, "{} ({})", self.display_name(), name),
            None => f.write_str(self.display_name()),
        }
    }
}

// TypeId-only comparison for concrete types; the name is diagnostics only
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::TypeNamed(a, _, name_a), Key::TypeNamed(b, _, name_b)) => a == b && name_a == name_b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            (Key::TraitNamed(a, name_a), Key::TraitNamed(b, name_b)) => a == b && name_a == name_b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::TypeNamed(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
            Key::Trait(name) => {
                2u8.hash(state);
                name.hash(state);
            }
            Key::TraitNamed(name, named) => {
                3u8.hash(state);
                name.hash(state);
                named.hash(state);
            }
        }
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a trait object type such as `dyn Logger`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}

/// Identity of an implementation type, used by initializers and diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl std::hash::Hash for TypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
