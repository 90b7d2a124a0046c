//! Ambient scope lookup for resolutions that do not name a scope.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use super::Scope;

/// Finds the scope that applies to a resolution made without an explicit one.
///
/// Resolving through a [`Scope`] always uses that scope. Resolving through the
/// [`Container`](crate::Container) asks the configured locator; scoped services
/// fail with [`DiError::NoActiveScope`](crate::DiError::NoActiveScope) when it
/// has nothing to offer.
pub trait ScopeLocator: Send + Sync {
    /// The scope active for the calling context, if any.
    fn current(&self) -> Option<Arc<Scope>>;
}

/// Never reports an ambient scope. The default locator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAmbientScope;

impl ScopeLocator for NoAmbientScope {
    fn current(&self) -> Option<Arc<Scope>> {
        None
    }
}

thread_local! {
    static AMBIENT: RefCell<Vec<Arc<Scope>>> = const { RefCell::new(Vec::new()) };
}

/// Ambient scope per thread, entered with [`ThreadLocalScopeLocator::enter`].
///
/// Entering pushes onto a per-thread stack, so nested entries shadow outer ones
/// until their guard is dropped.
///
/// ```
/// use ferrous_container::{Container, Lifetime, Resolver, ThreadLocalScopeLocator};
///
/// struct RequestId(u32);
///
/// let container = Container::new();
/// container.set_scope_locator(ThreadLocalScopeLocator).unwrap();
/// container.add_factory(Lifetime::Scoped, |_| Ok(RequestId(7))).unwrap();
///
/// let scope = container.begin_scope();
/// let _guard = ThreadLocalScopeLocator::enter(scope.clone());
/// assert_eq!(container.get_required::<RequestId>().0, 7);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLocalScopeLocator;

impl ThreadLocalScopeLocator {
    /// Makes `scope` the ambient scope of this thread until the guard is dropped.
    pub fn enter(scope: Arc<Scope>) -> AmbientScopeGuard {
        AMBIENT.with(|stack| stack.borrow_mut().push(scope));
        AmbientScopeGuard {
            _not_send: PhantomData,
        }
    }
}

impl ScopeLocator for ThreadLocalScopeLocator {
    fn current(&self) -> Option<Arc<Scope>> {
        AMBIENT.with(|stack| stack.borrow().last().cloned())
    }
}

/// Leaves the ambient scope entered by [`ThreadLocalScopeLocator::enter`] on drop.
#[must_use = "the ambient scope is left as soon as the guard is dropped"]
pub struct AmbientScopeGuard {
    // tied to the thread whose stack it pushed onto
    _not_send: PhantomData<*const ()>,
}

impl Drop for AmbientScopeGuard {
    fn drop(&mut self) {
        AMBIENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
