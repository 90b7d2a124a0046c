//! Cycle detection for producers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::{DiError, DiResult};

/// Detects a producer re-entering itself on the same thread.
///
/// Each thread currently creating through the producer holds a frame. Entering
/// while the calling thread already holds one is a cycle. Once the producer has
/// produced successfully the guard is disarmed: a graph that resolved once has
/// no cycle through this producer, and later calls skip the bookkeeping.
pub(crate) struct CyclicDependencyGuard {
    armed: AtomicBool,
    active: Mutex<SmallVec<[ThreadId; 4]>>,
}

impl CyclicDependencyGuard {
    pub(crate) fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
            active: Mutex::new(SmallVec::new()),
        }
    }

    #[inline]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub(crate) fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Registers the calling thread; fails with a one-element cycle chain when it is already inside.
    pub(crate) fn enter(&self, service: &'static str) -> DiResult<GuardFrame<'_>> {
        let thread = thread::current().id();
        let mut active = self.active.lock();
        if active.contains(&thread) {
            return Err(DiError::CyclicDependency {
                chain: vec![service],
            });
        }
        active.push(thread);
        Ok(GuardFrame { guard: self, thread })
    }
}

/// Leaves the guard on drop, also when creation failed or panicked.
pub(crate) struct GuardFrame<'a> {
    guard: &'a CyclicDependencyGuard,
    thread: ThreadId,
}

impl Drop for GuardFrame<'_> {
    fn drop(&mut self) {
        let mut active = self.guard.active.lock();
        if let Some(pos) = active.iter().position(|t| *t == self.thread) {
            active.swap_remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_on_same_thread_is_a_cycle() {
        let guard = CyclicDependencyGuard::new();
        let frame = guard.enter("A").unwrap();
        let err = guard.enter("A").err().unwrap();
        assert_eq!(err.cycle(), Some(&["A"][..]));
        drop(frame);
        assert!(guard.enter("A").is_ok());
    }

    #[test]
    fn other_threads_are_not_cycles() {
        let guard = CyclicDependencyGuard::new();
        let _frame = guard.enter("A").unwrap();
        std::thread::scope(|s| {
            s.spawn(|| assert!(guard.enter("A").is_ok()));
        });
    }
}
