//! Scopes: instance caches with ordered, error-tolerant teardown.
//!
//! A [`Scope`] caches one instance per registration for as long as it lives and
//! tracks every disposable instance it created. Every container owns a root
//! scope holding its singletons; request scopes come from
//! [`Container::begin_scope`](crate::Container::begin_scope).
//!
//! Teardown runs in two phases per pass: end-of-scope actions in registration
//! order, then disposables in reverse creation order. Work queued while tearing
//! down is picked up by the next pass, bounded by
//! [`ContainerOptions::max_dispose_recursion`](crate::ContainerOptions).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::container::{Container, ServiceIter};
use crate::error::{DiError, DiResult};
use crate::ids::{RegistrationId, ScopeId};
use crate::key::Key;
use crate::traits::ResolverCore;
use crate::AnyArc;

mod disposal;
mod dispose_bag;
mod locator;

pub use disposal::{Disposability, Disposable, DisposalProbe};
pub(crate) use disposal::DisposalPolicy;
pub use locator::{AmbientScopeGuard, NoAmbientScope, ScopeLocator, ThreadLocalScopeLocator};

use dispose_bag::DisposeBag;

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting instances and teardown registrations.
    Alive,
    /// Teardown in progress; registrations are still accepted and picked up by a later pass.
    Disposing,
    /// Teardown finished; every operation fails with [`DiError::ObjectDisposed`].
    Disposed,
}

struct ScopeState {
    lifecycle: Lifecycle,
    instances: HashMap<RegistrationId, Arc<InstanceSlot>>,
    bag: DisposeBag,
}

#[derive(Default)]
struct InstanceSlot {
    cell: OnceCell<AnyArc>,
    building: Mutex<SmallVec<[ThreadId; 2]>>,
}

/// Removes the current thread from a slot's builders when creation ends, successfully or not.
struct BuildingFrame<'a> {
    slot: &'a InstanceSlot,
    thread: ThreadId,
}

impl Drop for BuildingFrame<'_> {
    fn drop(&mut self) {
        let mut building = self.slot.building.lock();
        if let Some(pos) = building.iter().position(|t| *t == self.thread) {
            building.swap_remove(pos);
        }
    }
}

/// Scoped instance cache and disposal tracker.
///
/// Scoped registrations get one instance per scope; the container's root scope
/// holds singletons. Disposing a scope runs its end-of-scope actions and then
/// disposes everything it tracked, last created first.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let container = Container::new();
/// container
///     .add_factory(Lifetime::Scoped, |_| Ok(DatabaseConnection("connection-123".to_string())))
///     .unwrap();
/// container
///     .add_factory(Lifetime::Transient, |r| {
///         Ok(UserService { db: r.get::<DatabaseConnection>()? })
///     })
///     .unwrap();
///
/// let scope = container.begin_scope();
///
/// // Services resolved in the same scope share the scoped connection
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
///
/// let other = container.begin_scope();
/// assert!(!Arc::ptr_eq(&user1.db, &other.get_required::<UserService>().db));
/// ```
pub struct Scope {
    id: ScopeId,
    parent: Option<Arc<Scope>>,
    container: Option<Container>,
    me: Weak<Scope>,
    max_dispose_recursion: usize,
    disposed: AtomicBool,
    state: Mutex<ScopeState>,
}

impl Scope {
    /// The container-owned scope holding singletons. It does not resolve by itself.
    pub(crate) fn root(id: ScopeId, max_dispose_recursion: usize) -> Arc<Scope> {
        Self::create(id, None, None, max_dispose_recursion)
    }

    pub(crate) fn new(
        id: ScopeId,
        container: Container,
        parent: Option<Arc<Scope>>,
        max_dispose_recursion: usize,
    ) -> Arc<Scope> {
        Self::create(id, Some(container), parent, max_dispose_recursion)
    }

    fn create(
        id: ScopeId,
        container: Option<Container>,
        parent: Option<Arc<Scope>>,
        max_dispose_recursion: usize,
    ) -> Arc<Scope> {
        tracing::debug!(scope = %id, parent = ?parent.as_ref().map(|p| p.id()), "scope created");
        Arc::new_cyclic(|me| Scope {
            id,
            parent,
            container,
            me: me.clone(),
            max_dispose_recursion,
            disposed: AtomicBool::new(false),
            state: Mutex::new(ScopeState {
                lifecycle: Lifecycle::Alive,
                instances: HashMap::new(),
                bag: DisposeBag::default(),
            }),
        })
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The scope this one was started from, if any.
    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Lock-free check used in front of caches that live outside the scope.
    pub(crate) fn ensure_alive(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    /// Number of end actions and disposables waiting for teardown.
    pub fn pending_disposals(&self) -> usize {
        self.state.lock().bag.len()
    }

    pub(crate) fn arc(&self) -> Option<Arc<Scope>> {
        self.me.upgrade()
    }

    fn container(&self) -> DiResult<&Container> {
        self.container.as_ref().ok_or_else(|| {
            DiError::InvalidOperation(format!("{} belongs to the container and cannot resolve", self.id))
        })
    }

    fn disposed_error(&self) -> DiError {
        DiError::ObjectDisposed { scope: self.id.get() }
    }

    /// Starts a nested scope with this one as parent.
    pub fn begin_child(&self) -> DiResult<Arc<Scope>> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let parent = self
            .arc()
            .ok_or_else(|| DiError::InvalidOperation(format!("{} is being dropped", self.id)))?;
        Ok(self.container()?.begin_scope_within(Some(parent)))
    }

    /// Returns the instance cached for `registration`, creating it with `create` on first use.
    ///
    /// At most one instance is ever published per registration, even under
    /// concurrent first requests. `create` runs outside the scope's lock, so it may
    /// resolve other services from this scope. A fresh instance is tracked for
    /// disposal according to `policy`.
    pub(crate) fn get_or_create<F>(
        &self,
        registration: RegistrationId,
        policy: &DisposalPolicy,
        create: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let slot = {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::Disposed {
                return Err(self.disposed_error());
            }
            let slot = state.instances.entry(registration).or_default();
            if let Some(instance) = slot.cell.get() {
                return Ok(instance.clone());
            }
            slot.clone()
        };

        let thread = thread::current().id();
        {
            let mut building = slot.building.lock();
            if building.contains(&thread) {
                return Err(DiError::CyclicDependency {
                    chain: vec![policy.service],
                });
            }
            building.push(thread);
        }
        let _frame = BuildingFrame {
            slot: &slot,
            thread,
        };

        // published only once tracked, so a failed track leaves the slot empty
        let instance = slot
            .cell
            .get_or_try_init(|| {
                let instance = create()?;
                self.track(&instance, policy)?;
                Ok::<_, DiError>(instance)
            })?
            .clone();
        Ok(instance)
    }

    pub(crate) fn track(&self, instance: &AnyArc, policy: &DisposalPolicy) -> DiResult<()> {
        if policy.suppressed {
            return Ok(());
        }
        match &policy.disposability {
            Disposability::Never => Ok(()),
            Disposability::Always(probe) => match probe(instance) {
                Some(disposable) => self.register_for_disposal(disposable),
                None => Err(DiError::InvalidOperation(format!(
                    "{} was registered as disposable but supports neither synchronous nor asynchronous disposal",
                    policy.service
                ))),
            },
            Disposability::Unknown(probe) => match probe(instance) {
                Some(disposable) => self.register_for_disposal(disposable),
                None => Ok(()),
            },
        }
    }

    /// Tracks `disposable` for teardown when this scope ends.
    pub fn register_for_disposal(&self, disposable: Disposable) -> DiResult<()> {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.disposed_error());
        }
        state.bag.push(disposable);
        Ok(())
    }

    /// Tracks a type-erased instance, letting `probe` find its disposal capability.
    ///
    /// Fails with [`DiError::InvalidOperation`] when the probe finds neither kind of disposal.
    pub fn register_any_for_disposal(&self, instance: &AnyArc, probe: &DisposalProbe) -> DiResult<()> {
        match probe(instance) {
            Some(disposable) => self.register_for_disposal(disposable),
            None => Err(DiError::InvalidOperation(
                "instance supports neither synchronous nor asynchronous disposal".to_string(),
            )),
        }
    }

    /// Registers `action` to run when this scope ends, before any disposal.
    ///
    /// Actions run in registration order. When one fails the remaining actions are
    /// skipped; disposal still happens and the failure is reported afterwards.
    pub fn when_scope_ends<F>(&self, action: F) -> DiResult<()>
    where
        F: FnOnce(&Scope) -> DiResult<()> + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.disposed_error());
        }
        state.bag.push_end_action(Box::new(action));
        Ok(())
    }

    /// Moves the scope to [`Lifecycle::Disposing`]; false when another call got there first.
    fn begin_disposal(&self) -> bool {
        let mut state = self.state.lock();
        if state.lifecycle != Lifecycle::Alive {
            return false;
        }
        state.lifecycle = Lifecycle::Disposing;
        true
    }

    /// Takes the next pass of work, or `None` when teardown is complete.
    fn next_pass(
        &self,
        passes: &mut usize,
        errors: &mut Vec<DiError>,
    ) -> Option<(Vec<dispose_bag::EndAction>, Vec<Disposable>)> {
        let (actions, disposables) = {
            let mut state = self.state.lock();
            if state.bag.is_empty() {
                return None;
            }
            state.bag.take()
        };
        if *passes >= self.max_dispose_recursion {
            tracing::warn!(scope = %self.id, limit = self.max_dispose_recursion, "disposal recursion limit reached");
            errors.push(DiError::RecursionLimit {
                scope: self.id.get(),
                limit: self.max_dispose_recursion,
            });
            return None;
        }
        *passes += 1;
        Some((actions, disposables))
    }

    fn finish_disposal(&self, errors: Vec<DiError>) -> DiResult<()> {
        let released = {
            let mut state = self.state.lock();
            state.lifecycle = Lifecycle::Disposed;
            self.disposed.store(true, Ordering::Release);
            let leftover = std::mem::take(&mut state.bag);
            (std::mem::take(&mut state.instances), leftover)
        };
        drop(released);
        tracing::debug!(scope = %self.id, failures = errors.len(), "scope disposed");
        match DiError::from_deferred(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Ends the scope synchronously.
    ///
    /// Idempotent: only the first call does any work. Disposal failures do not
    /// stop the teardown; one failure is returned as-is, several as
    /// [`DiError::Aggregate`]. Instances that only support asynchronous disposal
    /// are reported as [`DiError::AsyncDisposalRequired`].
    pub fn dispose(&self) -> DiResult<()> {
        if !self.begin_disposal() {
            return Ok(());
        }
        tracing::debug!(scope = %self.id, "disposing scope");
        let mut errors = Vec::new();
        let mut passes = 0;
        while let Some((actions, disposables)) = self.next_pass(&mut passes, &mut errors) {
            dispose_bag::run_end_actions(self, actions, &mut errors);
            dispose_bag::run_sync_reverse(disposables, &mut errors);
        }
        self.finish_disposal(errors)
    }

    /// Ends the scope asynchronously, awaiting async disposal where available.
    pub async fn dispose_async(&self) -> DiResult<()> {
        if !self.begin_disposal() {
            return Ok(());
        }
        tracing::debug!(scope = %self.id, "disposing scope asynchronously");
        let mut errors = Vec::new();
        let mut passes = 0;
        while let Some((actions, disposables)) = self.next_pass(&mut passes, &mut errors) {
            dispose_bag::run_end_actions(self, actions, &mut errors);
            dispose_bag::run_async_reverse(disposables, &mut errors).await;
        }
        self.finish_disposal(errors)
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.container()?.resolve_at(key, Some(self), 0)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<ServiceIter> {
        self.container()?.iterate_at(key, Some(self), 0)
    }

    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        self.register_for_disposal(disposable)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("parent", &self.parent.as_ref().map(|p| p.id()))
            .field("lifecycle", &state.lifecycle)
            .field("instances", &state.instances.len())
            .field("pending", &state.bag.len())
            .finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.lifecycle != Lifecycle::Disposed && !state.bag.is_empty() {
            tracing::warn!(
                scope = %self.id,
                pending = state.bag.len(),
                "scope dropped without being disposed; tracked instances were not disposed"
            );
        }
    }
}
