//! Lifestyles: how long an instance lives and where it is cached.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::ids::RegistrationId;
use crate::key::Key;
use crate::plan::CompiledFactory;
use crate::scope::DisposalPolicy;
use crate::{AnyArc, ResolverContext};

/// What a lifestyle gets to wrap a registration's compiled factory.
pub struct LifestyleContext {
    pub(crate) registration: RegistrationId,
    pub(crate) service: Key,
    pub(crate) factory: CompiledFactory,
    pub(crate) disposal: DisposalPolicy,
}

impl LifestyleContext {
    /// Scopes cache instances under this id.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    pub fn service(&self) -> &Key {
        &self.service
    }

    /// The raw factory creating a new instance on every call.
    pub fn factory(&self) -> &CompiledFactory {
        &self.factory
    }

    /// Returns the instance cached in `scope`, creating and tracking it on first use.
    pub fn get_or_create_in(&self, scope: &crate::Scope, ctx: &ResolverContext) -> DiResult<AnyArc> {
        scope.get_or_create(self.registration, &self.disposal, || (self.factory)(ctx))
    }

    /// Creates a new instance and tracks it for disposal with `scope`, without caching it.
    pub fn create_in(&self, scope: &crate::Scope, ctx: &ResolverContext) -> DiResult<AnyArc> {
        scope.ensure_alive()?;
        let instance = (self.factory)(ctx)?;
        scope.track(&instance, &self.disposal)?;
        Ok(instance)
    }
}

/// A caching policy wrapped around a compiled factory.
///
/// `length` orders lifestyles by how long their instances live; a consumer must
/// never depend on something with a shorter length than its own. Custom
/// lifestyles implement this trait and are registered like the built-in ones.
pub trait Lifestyle: Send + Sync + fmt::Debug + 'static {
    /// Stable display name; registrations with the same name and implementation share a builder.
    fn name(&self) -> &'static str;

    /// Relative instance lifetime, longer lives get larger values.
    fn length(&self) -> u32;

    /// Wraps the raw factory with this lifestyle's caching.
    fn apply(&self, context: LifestyleContext) -> DiResult<CompiledFactory>;
}

/// Built-in lifestyles controlling instance caching behavior
///
/// # Lifestyle Characteristics
///
/// - **Singleton**: one instance per container, kept in the container's root scope
/// - **Scoped**: one instance per [`Scope`](crate::Scope)
/// - **Transient**: a new instance on every resolution, disposed with the scope that resolved it
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Container, Resolver, Lifetime};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
/// struct RequestModel { id: u32 }
///
/// let container = Container::new();
///
/// // Singleton: One instance for the entire container
/// container.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// }).unwrap();
///
/// // Scoped: One instance per scope
/// container.add_factory(Lifetime::Scoped, |r| {
///     let db = r.get::<Database>()?;
///     Ok(Repository { db_url: db.url.clone() })
/// }).unwrap();
///
/// // Transient: New instance every time
/// container.add_factory(Lifetime::Transient, |_| Ok(RequestModel { id: 12345 })).unwrap();
///
/// // Singleton: Same instance across scopes
/// let db1 = container.get_required::<Database>();
/// let scope1 = container.begin_scope();
/// let db2 = scope1.get_required::<Database>();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: Same within scope, different across scopes
/// let repo1a = scope1.get_required::<Repository>();
/// let repo1b = scope1.get_required::<Repository>();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
///
/// let scope2 = container.begin_scope();
/// let repo2 = scope2.get_required::<Repository>();
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// // Transient: Always different instances
/// let model1 = scope1.get_required::<RequestModel>();
/// let model2 = scope1.get_required::<RequestModel>();
/// assert!(!Arc::ptr_eq(&model1, &model2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per container, cached in the root scope until the container is disposed
    Singleton,
    /// Single instance per scope, cached for the scope's lifetime
    ///
    /// Resolving a scoped service needs a scope: either resolve through a
    /// [`Scope`](crate::Scope), or configure a [`ScopeLocator`](crate::ScopeLocator)
    /// that provides an ambient one.
    Scoped,
    /// New instance per resolution, never cached; disposable instances are tracked by the resolving scope
    Transient,
}

impl Lifestyle for Lifetime {
    fn name(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        }
    }

    fn length(&self) -> u32 {
        match self {
            Lifetime::Singleton => 1000,
            Lifetime::Scoped => 500,
            Lifetime::Transient => 1,
        }
    }

    fn apply(&self, context: LifestyleContext) -> DiResult<CompiledFactory> {
        match self {
            Lifetime::Transient if !context.disposal.tracks_instances() => {
                let factory = context.factory;
                Ok(Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                    ctx.scope().unwrap_or_else(|| ctx.root_scope()).ensure_alive()?;
                    factory(ctx)
                }))
            }
            Lifetime::Transient => {
                let context = Arc::new(context);
                Ok(Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                    match ctx.scope() {
                        Some(scope) => context.create_in(scope, ctx),
                        None => context.create_in(ctx.root_scope(), ctx),
                    }
                }))
            }
            Lifetime::Scoped => {
                let context = Arc::new(context);
                Ok(Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                    let scope = ctx
                        .scope()
                        .ok_or(DiError::NoActiveScope(context.service.display_name()))?;
                    context.get_or_create_in(scope, ctx)
                }))
            }
            Lifetime::Singleton => {
                // fast path in front of the root scope's cache
                let local: OnceCell<AnyArc> = OnceCell::new();
                let context = Arc::new(context);
                Ok(Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                    let root = ctx.root_scope();
                    root.ensure_alive()?;
                    local
                        .get_or_try_init(|| context.get_or_create_in(root, ctx))
                        .cloned()
                }))
            }
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_order_lifestyles() {
        assert!(Lifetime::Singleton.length() > Lifetime::Scoped.length());
        assert!(Lifetime::Scoped.length() > Lifetime::Transient.length());
        assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
    }
}
