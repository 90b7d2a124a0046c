//! Error types for the dependency injection container.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Shared, cloneable boxed error used for user-supplied failures.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Where the container was locked for resolution.
///
/// Captured once, at the first explicit or implicit lock, and carried by every
/// [`DiError::ContainerLocked`] so a late registration can be traced back to the
/// call that ended the registration phase.
#[derive(Debug, Clone)]
pub struct LockSite {
    location: &'static Location<'static>,
    thread: Option<String>,
    trigger: Option<&'static str>,
}

impl LockSite {
    #[track_caller]
    pub(crate) fn capture() -> Self {
        Self {
            location: Location::caller(),
            thread: std::thread::current().name().map(str::to_owned),
            trigger: None,
        }
    }

    /// Records the service whose resolution locked the container implicitly.
    pub(crate) fn triggered_by(mut self, service: &'static str) -> Self {
        self.trigger = Some(service);
        self
    }

    /// Source file of the call that locked the container.
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Source line of the call that locked the container.
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Name of the thread that locked the container, if it had one.
    pub fn thread_name(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    /// The service being resolved when the lock happened implicitly.
    pub fn trigger(&self) -> Option<&'static str> {
        self.trigger
    }
}

impl fmt::Display for LockSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location.file(), self.location.line())?;
        if let Some(thread) = &self.thread {
            write!(f, " (thread `{}`)", thread)?;
        }
        if let Some(service) = self.trigger {
            write!(f, " while resolving {}", service)?;
        }
        Ok(())
    }
}

/// Dependency injection errors
///
/// Represents the various error conditions that can occur during service
/// registration, resolution, or scope teardown.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Container, DiError, Resolver};
///
/// let container = Container::new();
/// match container.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_container::DiError;
///
/// let circular = DiError::CyclicDependency { chain: vec!["ServiceA", "ServiceB", "ServiceA"] };
/// assert_eq!(circular.to_string(), "Cyclic dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A recipe cannot be turned into a plan
    #[error("Configuration error for {service}: {message}")]
    Configuration {
        service: &'static str,
        message: String,
    },
    /// A constructor parameter or injected property has no registration
    #[error("Unresolvable parameter `{parameter}` of {consumer}: no registration for {dependency}")]
    MissingDependency {
        consumer: &'static str,
        parameter: &'static str,
        dependency: &'static str,
    },
    /// Registration attempted after the container was locked
    #[error("Container is locked, cannot {attempted}; locked at {lock_site}")]
    ContainerLocked {
        attempted: String,
        lock_site: LockSite,
    },
    /// Self-referential construction chain, outermost service first
    #[error("Cyclic dependency: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<&'static str> },
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// The compiled factory failed while creating an instance
    #[error("Activation of {service} failed: {source}")]
    Activation {
        service: &'static str,
        source: Box<DiError>,
    },
    /// A user-supplied factory delegate failed
    #[error("Factory delegate registered for {service} failed: {source}")]
    DelegateFailed {
        service: &'static str,
        source: Box<DiError>,
    },
    /// An implicitly registered concrete type could not be created
    #[error("Implicitly registered type {service} could not be created: {source}")]
    ImplicitRegistrationFailed {
        service: &'static str,
        source: Box<DiError>,
    },
    /// The plan compiler rejected a construction plan
    #[error("Plan compilation failed for {service}: {message}")]
    PlanCompilation {
        service: &'static str,
        message: String,
    },
    /// A longer-lived service captures a shorter-lived dependency
    #[error(
        "Lifestyle mismatch: {consumer} ({consumer_lifestyle}) depends on {dependency} ({dependency_lifestyle})"
    )]
    LifestyleMismatch {
        consumer: &'static str,
        consumer_lifestyle: &'static str,
        dependency: &'static str,
        dependency_lifestyle: &'static str,
    },
    /// A scoped service was requested without an active scope
    #[error("No active scope to resolve scoped service {0}")]
    NoActiveScope(&'static str),
    /// Operation attempted on a disposed scope
    #[error("Scope {scope} is disposed")]
    ObjectDisposed { scope: u64 },
    /// Operation not valid for the given instance or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Teardown kept queuing new work past the configured ceiling
    #[error("Disposal of scope {scope} exceeded the recursion limit of {limit}")]
    RecursionLimit { scope: u64, limit: usize },
    /// Synchronous disposal reached an instance that can only be disposed asynchronously
    #[error("{0} only supports asynchronous disposal, use dispose_async")]
    AsyncDisposalRequired(&'static str),
    /// A disposable failed during teardown
    #[error("Disposal of {type_name} failed: {source}")]
    Disposal {
        type_name: &'static str,
        source: BoxError,
    },
    /// Several deferred failures, in the order they occurred
    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<DiError>),
    /// Error raised by user code (factories, initializers, end-of-scope actions)
    #[error(transparent)]
    User(BoxError),
}

fn format_aggregate(errors: &[DiError]) -> String {
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} errors occurred: {}", errors.len(), joined)
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

impl DiError {
    /// Wraps an arbitrary error raised by user code.
    pub fn user<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DiError::User(Arc::new(error))
    }

    /// Creates a user error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        DiError::User(Arc::new(Message(message.into())))
    }

    /// Returns the cycle chain if this is a cyclic dependency error.
    pub fn cycle(&self) -> Option<&[&'static str]> {
        match self {
            DiError::CyclicDependency { chain } => Some(chain),
            _ => None,
        }
    }

    /// True for any of the activation failures.
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            DiError::Activation { .. }
                | DiError::DelegateFailed { .. }
                | DiError::ImplicitRegistrationFailed { .. }
        )
    }

    /// Errors that already carry enough context and must not be wrapped again.
    pub(crate) fn is_specific(&self) -> bool {
        self.is_activation()
            || matches!(
                self,
                DiError::NotFound(_)
                    | DiError::CyclicDependency { .. }
                    | DiError::DepthExceeded(_)
                    | DiError::ContainerLocked { .. }
                    | DiError::ObjectDisposed { .. }
                    | DiError::InvalidOperation(_)
                    | DiError::NoActiveScope(_)
                    | DiError::LifestyleMismatch { .. }
                    | DiError::MissingDependency { .. }
                    | DiError::Configuration { .. }
                    | DiError::PlanCompilation { .. }
            )
    }

    /// Prepends `service` to an open cycle chain while the error unwinds.
    ///
    /// The chain starts as `[X]` at the detection point and is closed once its first
    /// and last entries are the same service; after that it is left untouched.
    pub(crate) fn extend_cycle(self, service: &'static str) -> Self {
        match self {
            DiError::CyclicDependency { mut chain } => {
                let closed = chain.len() > 1 && chain.first() == chain.last();
                if !closed {
                    chain.insert(0, service);
                }
                DiError::CyclicDependency { chain }
            }
            other => other,
        }
    }

    /// Collapses deferred failures: none, exactly one as-is, or an aggregate.
    pub(crate) fn from_deferred(mut errors: Vec<DiError>) -> Option<DiError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(DiError::Aggregate(errors)),
        }
    }
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotFound("some_service"))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_chain_closes_once_it_loops() {
        let err = DiError::CyclicDependency { chain: vec!["A"] };
        let err = err.extend_cycle("B").extend_cycle("A").extend_cycle("Root");
        assert_eq!(err.cycle().unwrap(), &["A", "B", "A"]);
    }

    #[test]
    fn deferred_errors_collapse() {
        assert!(DiError::from_deferred(Vec::new()).is_none());

        let single = DiError::from_deferred(vec![DiError::NotFound("A")]).unwrap();
        assert!(matches!(single, DiError::NotFound("A")));

        let many = DiError::from_deferred(vec![
            DiError::NotFound("A"),
            DiError::message("boom"),
        ])
        .unwrap();
        assert_eq!(
            many.to_string(),
            "2 errors occurred: Service not found: A; boom"
        );
    }
}
