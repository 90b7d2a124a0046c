//! Identity values handed out by a container.
//!
//! Every container owns one [`IdGenerator`]; scopes, registrations and producers
//! draw their ids from it, so two containers in the same process never share a
//! counter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// The raw id value.
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a registration (a construction plan builder). Scopes cache
    /// instances under this id, so every producer sharing a builder shares its
    /// cached instances.
    RegistrationId,
    "registration"
);
id_type!(
    /// Identity of a scope.
    ScopeId,
    "scope"
);
id_type!(
    /// Identity of an instance producer.
    ProducerId,
    "producer"
);

/// Monotonic id source owned by a container.
#[derive(Debug)]
pub(crate) struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn registration(&self) -> RegistrationId {
        RegistrationId(self.next())
    }

    pub(crate) fn scope(&self) -> ScopeId {
        ScopeId(self.next())
    }

    pub(crate) fn producer(&self) -> ProducerId {
        ProducerId(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_independent() {
        let a = IdGenerator::new();
        let b = IdGenerator::new();

        assert_eq!(a.scope().get(), 1);
        assert_eq!(a.registration().get(), 2);
        assert_eq!(b.scope().get(), 1);
        assert_eq!(a.producer().to_string(), "producer-3");
    }
}
