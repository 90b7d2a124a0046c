//! Rewriting construction plans before they are compiled.
//!
//! Interceptors see the plan of every producer they apply to and may wrap or
//! replace its root node. Decorators are the common case and come with typed
//! adapters: [`ServiceDecorator`] for concrete implementation types and
//! [`TraitDecorator`] for trait services.

use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{Key, TypeInfo};
use crate::lifestyle::Lifestyle;
use crate::{AnyArc, ResolverContext};

use super::{PlanNode, Recipe};

/// The registration whose plan is being built.
pub struct InterceptionTarget<'a> {
    pub service: &'a Key,
    pub implementation: TypeInfo,
    pub lifestyle: &'a dyn Lifestyle,
    pub(crate) recipe: &'a Recipe,
}

impl InterceptionTarget<'_> {
    /// True when plan values are stored as the service itself (`Arc<dyn Trait>`)
    /// rather than as the implementation type.
    pub fn yields_service_shape(&self) -> bool {
        self.service.is_trait() && !matches!(self.recipe, Recipe::Constructor(_))
    }
}

/// Rewrites plans before compilation.
///
/// Interceptors run in registration order; each receives the node produced by
/// the previous one. An error aborts plan building with
/// [`DiError::Configuration`].
pub trait PlanInterceptor: Send + Sync {
    fn applies_to(&self, target: &InterceptionTarget<'_>) -> bool;

    fn intercept(&self, target: &InterceptionTarget<'_>, node: PlanNode) -> DiResult<PlanNode>;
}

/// Interceptor assembled from two closures.
pub(crate) struct FnInterceptor<A, I> {
    pub(crate) applies: A,
    pub(crate) intercept: I,
}

impl<A, I> PlanInterceptor for FnInterceptor<A, I>
where
    A: Fn(&InterceptionTarget<'_>) -> bool + Send + Sync,
    I: Fn(&InterceptionTarget<'_>, PlanNode) -> DiResult<PlanNode> + Send + Sync,
{
    fn applies_to(&self, target: &InterceptionTarget<'_>) -> bool {
        (self.applies)(target)
    }

    fn intercept(&self, target: &InterceptionTarget<'_>, node: PlanNode) -> DiResult<PlanNode> {
        (self.intercept)(target, node)
    }
}

/// A decorator that wraps or replaces instances of a concrete type.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, DiResult, ResolverContext, Resolver, ServiceDecorator};
/// use std::sync::Arc;
///
/// struct ApiService {
///     calls: u32,
/// }
///
/// struct StartAtTen;
///
/// impl ServiceDecorator<ApiService> for StartAtTen {
///     fn decorate(&self, original: Arc<ApiService>, _ctx: &ResolverContext) -> DiResult<Arc<ApiService>> {
///         Ok(Arc::new(ApiService { calls: original.calls + 10 }))
///     }
/// }
///
/// let container = Container::new();
/// container.add_singleton(ApiService { calls: 0 }).unwrap();
/// container.decorate_with::<ApiService, _>(StartAtTen).unwrap();
///
/// assert_eq!(container.get_required::<ApiService>().calls, 10);
/// ```
pub trait ServiceDecorator<T: Send + Sync + 'static>: Send + Sync {
    fn decorate(&self, original: Arc<T>, ctx: &ResolverContext) -> DiResult<Arc<T>>;
}

/// A decorator for trait services.
///
/// Applies to trait registrations whose values are stored as the trait object:
/// pre-built instances and factories returning `Arc<dyn Trait>`. Constructor
/// registrations of a trait are decorated through their implementation type
/// with a [`ServiceDecorator`].
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, DiResult, ResolverContext, Resolver, TraitDecorator};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct Plain;
/// impl Greeter for Plain {
///     fn greet(&self) -> String { "hello".to_string() }
/// }
///
/// struct Loud(Arc<dyn Greeter>);
/// impl Greeter for Loud {
///     fn greet(&self) -> String { self.0.greet().to_uppercase() }
/// }
///
/// struct MakeLoud;
/// impl TraitDecorator<dyn Greeter> for MakeLoud {
///     fn decorate(&self, original: Arc<dyn Greeter>, _ctx: &ResolverContext) -> DiResult<Arc<dyn Greeter>> {
///         Ok(Arc::new(Loud(original)))
///     }
/// }
///
/// let container = Container::new();
/// container.add_singleton_trait::<dyn Greeter>(Arc::new(Plain)).unwrap();
/// container.decorate_trait_with::<dyn Greeter, _>(MakeLoud).unwrap();
///
/// assert_eq!(container.get_required_trait::<dyn Greeter>().greet(), "HELLO");
/// ```
pub trait TraitDecorator<T: ?Sized + Send + Sync + 'static>: Send + Sync {
    fn decorate(&self, original: Arc<T>, ctx: &ResolverContext) -> DiResult<Arc<T>>;
}

/// Adapts a [`ServiceDecorator`] into a plan interceptor.
pub(crate) struct DecorateService<T, D> {
    decorator: Arc<D>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, D> DecorateService<T, D> {
    pub(crate) fn new(decorator: D) -> Self {
        Self {
            decorator: Arc::new(decorator),
            _marker: PhantomData,
        }
    }
}

impl<T, D> PlanInterceptor for DecorateService<T, D>
where
    T: Send + Sync + 'static,
    D: ServiceDecorator<T> + 'static,
{
    fn applies_to(&self, target: &InterceptionTarget<'_>) -> bool {
        target.implementation.id() == TypeId::of::<T>()
    }

    fn intercept(&self, _target: &InterceptionTarget<'_>, node: PlanNode) -> DiResult<PlanNode> {
        let decorator = self.decorator.clone();
        Ok(PlanNode::Decorate {
            target: Box::new(node),
            label: type_name::<D>(),
            decorator: Arc::new(move |instance: AnyArc, ctx: &ResolverContext| -> DiResult<AnyArc> {
                let typed = instance
                    .downcast::<T>()
                    .map_err(|_| DiError::TypeMismatch(type_name::<T>()))?;
                let decorated: AnyArc = decorator.decorate(typed, ctx)?;
                Ok(decorated)
            }),
        })
    }
}

/// Adapts a [`TraitDecorator`] into a plan interceptor.
pub(crate) struct DecorateTrait<T: ?Sized, D> {
    decorator: Arc<D>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized, D> DecorateTrait<T, D> {
    pub(crate) fn new(decorator: D) -> Self {
        Self {
            decorator: Arc::new(decorator),
            _marker: PhantomData,
        }
    }
}

impl<T, D> PlanInterceptor for DecorateTrait<T, D>
where
    T: ?Sized + Send + Sync + 'static,
    D: TraitDecorator<T> + 'static,
{
    fn applies_to(&self, target: &InterceptionTarget<'_>) -> bool {
        target.yields_service_shape() && target.service.display_name() == type_name::<T>()
    }

    fn intercept(&self, _target: &InterceptionTarget<'_>, node: PlanNode) -> DiResult<PlanNode> {
        let decorator = self.decorator.clone();
        Ok(PlanNode::Decorate {
            target: Box::new(node),
            label: type_name::<D>(),
            decorator: Arc::new(move |instance: AnyArc, ctx: &ResolverContext| -> DiResult<AnyArc> {
                let original = instance
                    .downcast_ref::<Arc<T>>()
                    .cloned()
                    .ok_or(DiError::TypeMismatch(type_name::<T>()))?;
                let decorated = decorator.decorate(original, ctx)?;
                Ok(Arc::new(decorated))
            }),
        })
    }
}
