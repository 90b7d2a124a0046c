//! What a scope needs to know to tear an instance down.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::traits::{AsyncDispose, Dispose};
use crate::AnyArc;

/// An instance handed to a scope for teardown.
///
/// Carries the synchronous and/or asynchronous disposal capability of one
/// instance. At least one of the two is always present.
#[derive(Clone)]
pub struct Disposable {
    type_name: &'static str,
    sync: Option<Arc<dyn Dispose>>,
    asynchronous: Option<Arc<dyn AsyncDispose>>,
}

impl Disposable {
    /// An instance that only supports synchronous disposal.
    pub fn sync<T: Dispose>(instance: Arc<T>) -> Self {
        Self {
            type_name: type_name::<T>(),
            sync: Some(instance),
            asynchronous: None,
        }
    }

    /// An instance that only supports asynchronous disposal.
    pub fn asynchronous<T: AsyncDispose>(instance: Arc<T>) -> Self {
        Self {
            type_name: type_name::<T>(),
            sync: None,
            asynchronous: Some(instance),
        }
    }

    /// An instance supporting both; asynchronous teardown prefers the async path.
    pub fn both<T: Dispose + AsyncDispose>(instance: Arc<T>) -> Self {
        Self {
            type_name: type_name::<T>(),
            sync: Some(instance.clone()),
            asynchronous: Some(instance),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn sync_part(&self) -> Option<&Arc<dyn Dispose>> {
        self.sync.as_ref()
    }

    pub(crate) fn async_part(&self) -> Option<&Arc<dyn AsyncDispose>> {
        self.asynchronous.as_ref()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("type_name", &self.type_name)
            .field("sync", &self.sync.is_some())
            .field("async", &self.asynchronous.is_some())
            .finish()
    }
}

/// Inspects a type-erased instance and returns its disposal capability, if any.
pub type DisposalProbe = Arc<dyn Fn(&AnyArc) -> Option<Disposable> + Send + Sync>;

/// Whether instances of a registration need teardown.
#[derive(Clone)]
pub enum Disposability {
    /// Every instance is disposable; a probe that finds nothing is an error.
    Always(DisposalProbe),
    /// Instances are never tracked.
    Never,
    /// Decided per instance: tracked only when the probe finds something.
    Unknown(DisposalProbe),
}

impl Disposability {
    /// Instances of `T` are disposed synchronously.
    pub fn sync<T: Dispose>() -> Self {
        Disposability::Always(Arc::new(|instance: &AnyArc| {
            instance.clone().downcast::<T>().ok().map(Disposable::sync)
        }))
    }

    /// Instances of `T` are disposed asynchronously.
    pub fn asynchronous<T: AsyncDispose>() -> Self {
        Disposability::Always(Arc::new(|instance: &AnyArc| {
            instance.clone().downcast::<T>().ok().map(Disposable::asynchronous)
        }))
    }

    /// Instances of `T` support both kinds of disposal.
    pub fn both<T: Dispose + AsyncDispose>() -> Self {
        Disposability::Always(Arc::new(|instance: &AnyArc| {
            instance.clone().downcast::<T>().ok().map(Disposable::both)
        }))
    }

    /// Decide per instance with a custom probe.
    pub fn unknown<F>(probe: F) -> Self
    where
        F: Fn(&AnyArc) -> Option<Disposable> + Send + Sync + 'static,
    {
        Disposability::Unknown(Arc::new(probe))
    }
}

impl Default for Disposability {
    fn default() -> Self {
        Disposability::Never
    }
}

impl fmt::Debug for Disposability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposability::Always(_) => f.write_str("Always"),
            Disposability::Never => f.write_str("Never"),
            Disposability::Unknown(_) => f.write_str("Unknown"),
        }
    }
}

/// Disposal behaviour of one registration, as seen by the scope caching its instances.
#[derive(Debug, Clone)]
pub(crate) struct DisposalPolicy {
    pub(crate) service: &'static str,
    pub(crate) disposability: Disposability,
    pub(crate) suppressed: bool,
}

impl DisposalPolicy {
    pub(crate) fn new(service: &'static str, disposability: Disposability, suppressed: bool) -> Self {
        Self {
            service,
            disposability,
            suppressed,
        }
    }

    /// False when instances never need tracking.
    pub(crate) fn tracks_instances(&self) -> bool {
        !self.suppressed && !matches!(self.disposability, Disposability::Never)
    }
}
