//! Diagnostic observers for resolution events.
//!
//! Observers see top-level requests made through a container, a scope or a
//! factory's resolver: when each starts, how long it took, and why it failed.
//! Dependencies wired by a construction plan go straight to their producer and
//! are not reported. They are
//! registered before the container locks and are skipped entirely when none are
//! registered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::Key;

/// Observer trait for resolution events.
///
/// Calls are made synchronously on the resolving thread, so keep
/// implementations cheap.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, DiObserver, Key, Resolver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl DiObserver for Counting {
///     fn resolving(&self, _key: &Key) {}
///
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counting = Arc::new(Counting::default());
/// let container = Container::new();
/// container.add_observer(counting.clone()).unwrap();
/// container.add_singleton(7u8).unwrap();
///
/// container.get_required::<u8>();
/// assert_eq!(counting.0.load(Ordering::Relaxed), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// A resolution of `key` is starting.
    fn resolving(&self, key: &Key);

    /// `key` was resolved in `duration`.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Resolving `key` failed.
    fn resolution_failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }
}

/// The observers registered on a container.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn resolution_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(key, error);
        }
    }
}

/// Forwards resolution events to `tracing`.
///
/// Starts and completions are emitted at `TRACE`, failures at `DEBUG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DiObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(service = %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::trace!(service = %key, ?duration, "resolved");
    }

    fn resolution_failed(&self, key: &Key, error: &DiError) {
        tracing::debug!(service = %key, %error, "resolution failed");
    }
}

/// Counts resolutions, failures and total resolution time.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    resolutions: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn total_resolution_time(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    /// Mean time per successful resolution, if there was one.
    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed) / count))
    }

    pub fn reset(&self) {
        self.resolutions.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
    }
}

impl DiObserver for MetricsObserver {
    fn resolving(&self, _key: &Key) {}

    fn resolved(&self, _key: &Key, duration: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.total_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn resolution_failed(&self, _key: &Key, _error: &DiError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;

    #[test]
    fn metrics_observer_counts() {
        let metrics = MetricsObserver::new();
        let key = key_of_type::<u32>();
        assert_eq!(metrics.average_resolution_time(), None);

        metrics.resolved(&key, Duration::from_micros(10));
        metrics.resolved(&key, Duration::from_micros(30));
        metrics.resolution_failed(&key, &DiError::NotFound("u32"));

        assert_eq!(metrics.resolution_count(), 2);
        assert_eq!(metrics.failure_count(), 1);
        assert_eq!(metrics.average_resolution_time(), Some(Duration::from_micros(20)));

        metrics.reset();
        assert_eq!(metrics.resolution_count(), 0);
    }

    #[test]
    fn average_survives_counts_beyond_u32() {
        let metrics = MetricsObserver::new();
        let count = u64::from(u32::MAX) + 2;
        metrics.resolutions.store(count, Ordering::Relaxed);
        metrics.total_nanos.store(count * 3, Ordering::Relaxed);

        assert_eq!(metrics.average_resolution_time(), Some(Duration::from_nanos(3)));
    }

    #[test]
    fn observers_fan_out() {
        let first = Arc::new(MetricsObserver::new());
        let second = Arc::new(MetricsObserver::new());
        let mut observers = Observers::default();
        assert!(!observers.has_observers());
        observers.add(first.clone());
        observers.add(second.clone());

        observers.resolved(&key_of_type::<u8>(), Duration::from_nanos(5));
        assert_eq!(first.resolution_count(), 1);
        assert_eq!(second.resolution_count(), 1);
    }
}
