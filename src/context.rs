//! The context a compiled factory runs in.

use std::fmt;

use crate::container::{Container, ServiceIter};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::scope::{Disposable, Scope};
use crate::traits::ResolverCore;
use crate::AnyArc;

/// Passed to every factory, initializer and decorator while an instance is built.
///
/// Carries the container, the scope the outermost request was made in, and the
/// current resolution depth. Resolving through the context keeps the depth
/// counting, so runaway recursion in hand-written factories ends in
/// [`DiError::DepthExceeded`] instead of a stack overflow.
#[derive(Clone, Copy)]
pub struct ResolverContext<'a> {
    container: &'a Container,
    scope: Option<&'a Scope>,
    depth: usize,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(container: &'a Container, scope: Option<&'a Scope>, depth: usize) -> Self {
        Self {
            container,
            scope,
            depth,
        }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// The scope of the current request, if it was made in one.
    pub fn scope(&self) -> Option<&'a Scope> {
        self.scope
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The scope that owns singletons.
    pub(crate) fn root_scope(&self) -> &'a Scope {
        self.container.root_scope()
    }

    /// One level deeper, for dependencies wired by a plan.
    pub(crate) fn nested(&self) -> DiResult<ResolverContext<'a>> {
        let depth = self.depth + 1;
        let max = self.container.options().max_resolution_depth;
        if depth > max {
            return Err(DiError::DepthExceeded(max));
        }
        Ok(Self { depth, ..*self })
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.container.resolve_at(key, self.scope, self.depth + 1)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<ServiceIter> {
        self.container.iterate_at(key, self.scope, self.depth + 1)
    }

    /// Tracks `disposable` in the request's scope, or the root scope without one.
    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        match self.scope {
            Some(scope) => scope.register_for_disposal(disposable),
            None => self.root_scope().register_for_disposal(disposable),
        }
    }
}

impl fmt::Debug for ResolverContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContext")
            .field("scope", &self.scope.map(Scope::id))
            .field("depth", &self.depth)
            .finish()
    }
}
