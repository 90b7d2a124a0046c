//! Registration surface of the container.
//!
//! Everything here runs during the registration phase: once the container is
//! locked, each method fails with [`DiError::ContainerLocked`].

use std::any::{type_name, TypeId};
use std::sync::Arc;

use crate::container::{Container, UnregisteredTypeResolver};
use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key, TypeInfo};
use crate::lifestyle::{Lifestyle, Lifetime};
use crate::observer::DiObserver;
use crate::plan::{
    BindingPolicy, CompiledFactory, Constructor, DecorateService, DecorateTrait, FnInterceptor,
    Initializer, InterceptionTarget, ParameterOverride, PlanCompiler, PlanInterceptor, PlanNode,
    Recipe, ServiceDecorator, TraitDecorator,
};
use crate::producer::{DiagnosticType, ServiceCast};
use crate::scope::{Disposability, ScopeLocator};
use crate::traits::{AsyncDispose, Dispose};
use crate::{AnyArc, ResolverContext};

pub mod module_system;
pub use module_system::ServiceModule;

/// How one service is created and cached, before it is bound to a key.
///
/// The helpers on [`Container`] cover the common cases; build a `Registration`
/// directly for per-registration settings such as parameter overrides.
///
/// ```
/// use ferrous_container::{
///     Constructor, Container, Lifetime, ParameterOverride, Registration, Resolver, key_of_type,
/// };
/// use std::sync::Arc;
///
/// struct Port(u16);
/// struct Server {
///     port: Arc<Port>,
/// }
///
/// let container = Container::new();
/// container.add_singleton(Port(80)).unwrap();
/// container
///     .register(
///         key_of_type::<Server>(),
///         Registration::constructor(
///             Constructor::of::<Server>()
///                 .param::<Port>("port")
///                 .build(|args| Ok(Server { port: args.get("port")? })),
///         )
///         .with_lifestyle(Lifetime::Singleton)
///         .override_parameter("port", ParameterOverride::value(Port(8080))),
///     )
///     .unwrap();
///
/// assert_eq!(container.get_required::<Server>().port.0, 8080);
/// ```
pub struct Registration {
    pub(crate) recipe: Recipe,
    pub(crate) lifestyle: Arc<dyn Lifestyle>,
    pub(crate) disposability: Disposability,
    pub(crate) suppress_disposal: bool,
    pub(crate) overrides: Vec<(&'static str, ParameterOverride)>,
    pub(crate) suppressed: Vec<DiagnosticType>,
    pub(crate) cast: Option<ServiceCast>,
}

impl Registration {
    /// Creates instances from a recipe; transient unless changed.
    pub fn from_recipe(recipe: Recipe) -> Self {
        Self {
            recipe,
            lifestyle: Arc::new(Lifetime::Transient),
            disposability: Disposability::Never,
            suppress_disposal: false,
            overrides: Vec::new(),
            suppressed: Vec::new(),
            cast: None,
        }
    }

    /// Creates instances by calling `constructor` with resolved parameters.
    pub fn constructor(constructor: Constructor) -> Self {
        Self::from_recipe(Recipe::Constructor(constructor))
    }

    /// Creates instances of `T` with a factory.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let delegate: CompiledFactory = Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(ctx)?))
        });
        Self::from_recipe(Recipe::Delegate {
            implementation: TypeInfo::of::<T>(),
            delegate,
        })
    }

    /// Creates trait objects with a factory.
    pub fn trait_factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let delegate: CompiledFactory = Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(ctx)?))
        });
        Self::from_recipe(Recipe::Delegate {
            implementation: TypeInfo::of::<T>(),
            delegate,
        })
    }

    /// Hands out `value`. Singleton; the container never disposes it.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_recipe(Recipe::Instance {
            implementation: TypeInfo::of::<T>(),
            value: Arc::new(value),
        })
        .with_lifestyle(Lifetime::Singleton)
    }

    /// Hands out a pre-built trait object. Singleton; never disposed.
    pub fn trait_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::from_recipe(Recipe::Instance {
            implementation: TypeInfo::of::<T>(),
            value: Arc::new(value),
        })
        .with_lifestyle(Lifetime::Singleton)
    }

    pub fn with_lifestyle<L: Lifestyle>(self, lifestyle: L) -> Self {
        self.with_shared_lifestyle(Arc::new(lifestyle))
    }

    pub fn with_shared_lifestyle(mut self, lifestyle: Arc<dyn Lifestyle>) -> Self {
        self.lifestyle = lifestyle;
        self
    }

    /// Whether cached instances are tracked for disposal by their scope.
    pub fn with_disposability(mut self, disposability: Disposability) -> Self {
        self.disposability = disposability;
        self
    }

    /// Never dispose instances of this registration.
    pub fn suppress_disposal(mut self) -> Self {
        self.suppress_disposal = true;
        self
    }

    /// Replaces the constructor parameter `parameter`.
    pub fn override_parameter(mut self, parameter: &'static str, with: ParameterOverride) -> Self {
        self.overrides.push((parameter, with));
        self
    }

    pub fn suppress_diagnostic(mut self, diagnostic: DiagnosticType) -> Self {
        self.suppressed.push(diagnostic);
        self
    }

    /// Exposes instances of `I` as the trait object `T`.
    ///
    /// Scopes cache and dispose the `I` value; the conversion runs on every
    /// resolution, so registrations sharing one `I` hand out the same instance.
    pub fn as_trait<I, T, F>(mut self, upcast: F) -> Self
    where
        I: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<I>) -> Arc<T> + Send + Sync + 'static,
    {
        self.cast = Some(Arc::new(move |value: AnyArc| -> DiResult<AnyArc> {
            let concrete = value
                .downcast::<I>()
                .map_err(|_| DiError::TypeMismatch(type_name::<I>()))?;
            Ok(Arc::new(upcast(concrete)))
        }));
        self
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn lifestyle(&self) -> &dyn Lifestyle {
        &*self.lifestyle
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("recipe", &self.recipe)
            .field("lifestyle", &self.lifestyle.name())
            .field("disposability", &self.disposability)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl Container {
    /// Binds `key` to `registration`, replacing any earlier registration of `key`.
    pub fn register(&self, key: Key, registration: Registration) -> DiResult<()> {
        self.stage(
            || format!("register {}", key),
            |registry| registry.insert(self.materialize(key, registration, false)),
        )
    }

    /// Appends `registration` to the collection resolved by `resolve_many(key)`.
    pub fn register_collection_item(&self, key: Key, registration: Registration) -> DiResult<()> {
        self.stage(
            || format!("add an item to the collection {}", key),
            |registry| registry.push_collection_item(self.materialize(key, registration, false)),
        )
    }

    // ----- Concrete types -----

    /// Registers a singleton instance that is shared across the container.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_container::{Container, Resolver};
    /// struct Config {
    ///     database_url: String,
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .add_singleton(Config { database_url: "postgres://localhost".to_string() })
    ///     .unwrap();
    /// assert_eq!(container.get_required::<Config>().database_url, "postgres://localhost");
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&self, value: T) -> DiResult<()> {
        self.register(key_of_type::<T>(), Registration::instance(value))
    }

    pub fn add_named_singleton<T: Send + Sync + 'static>(&self, name: &'static str, value: T) -> DiResult<()> {
        self.register(key_of_type::<T>().named(name), Registration::instance(value))
    }

    /// Registers a factory for `T` under `lifestyle`.
    ///
    /// The factory receives a [`ResolverContext`] to resolve its own dependencies.
    pub fn add_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(
            key_of_type::<T>(),
            Registration::factory(factory).with_lifestyle(lifestyle),
        )
    }

    pub fn add_named_factory<T, L, F>(&self, name: &'static str, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(
            key_of_type::<T>().named(name),
            Registration::factory(factory).with_lifestyle(lifestyle),
        )
    }

    /// Registers a factory whose instances are disposed with their scope.
    ///
    /// Scoped instances are disposed with the scope that created them, singletons
    /// with the container, and transient instances with the scope of the
    /// resolution that created them.
    pub fn add_disposable_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: Dispose,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(
            key_of_type::<T>(),
            Registration::factory(factory)
                .with_lifestyle(lifestyle)
                .with_disposability(Disposability::sync::<T>()),
        )
    }

    /// Like [`add_disposable_factory`](Self::add_disposable_factory) for asynchronously disposed types.
    pub fn add_async_disposable_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: AsyncDispose,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(
            key_of_type::<T>(),
            Registration::factory(factory)
                .with_lifestyle(lifestyle)
                .with_disposability(Disposability::asynchronous::<T>()),
        )
    }

    /// Registers a type built by the container from its constructor metadata.
    pub fn add_type<L: Lifestyle>(&self, lifestyle: L, constructor: Constructor) -> DiResult<()> {
        let implementation = constructor.implementation();
        self.register(
            Key::Type(implementation.id(), implementation.name()),
            Registration::constructor(constructor).with_lifestyle(lifestyle),
        )
    }

    /// Lets the container create `constructor`'s type on demand without a registration.
    ///
    /// Such types are transient and reported as implicitly registered. Only
    /// consulted while
    /// [`ContainerOptions::resolve_unregistered_concrete_types`](crate::ContainerOptions)
    /// is set.
    pub fn add_resolvable(&self, constructor: Constructor) -> DiResult<()> {
        let implementation = constructor.implementation();
        self.stage(
            move || format!("add the resolvable type {}", implementation),
            |registry| registry.catalog.insert(constructor),
        )
    }

    // ----- Trait services -----

    /// Registers a pre-built trait object as a singleton.
    pub fn add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> DiResult<()> {
        self.register(key_of_trait::<T>(), Registration::trait_instance(value))
    }

    pub fn add_named_singleton_trait<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &'static str,
        value: Arc<T>,
    ) -> DiResult<()> {
        self.register(key_of_trait::<T>().named(name), Registration::trait_instance(value))
    }

    pub fn add_trait_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(
            key_of_trait::<T>(),
            Registration::trait_factory(factory).with_lifestyle(lifestyle),
        )
    }

    /// Registers the constructor of `I` as the implementation of the trait `T`.
    ///
    /// ```
    /// use ferrous_container::{Constructor, Container, Lifetime, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    /// struct Fixed;
    /// impl Clock for Fixed {
    ///     fn now(&self) -> u64 { 42 }
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .add_trait_type::<dyn Clock, Fixed, _>(
    ///         Lifetime::Singleton,
    ///         Constructor::of::<Fixed>().build(|_| Ok(Fixed)),
    ///         |fixed| fixed,
    ///     )
    ///     .unwrap();
    /// assert_eq!(container.get_required_trait::<dyn Clock>().now(), 42);
    /// ```
    pub fn add_trait_type<T, I, F>(&self, lifestyle: impl Lifestyle, constructor: Constructor, upcast: F) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
        F: Fn(Arc<I>) -> Arc<T> + Send + Sync + 'static,
    {
        if constructor.implementation().id() != TypeId::of::<I>() {
            return Err(DiError::Configuration {
                service: type_name::<T>(),
                message: format!(
                    "constructor builds {} but the upcast expects {}",
                    constructor.implementation(),
                    type_name::<I>()
                ),
            });
        }
        self.register(
            key_of_trait::<T>(),
            Registration::constructor(constructor)
                .with_lifestyle(lifestyle)
                .as_trait(upcast),
        )
    }

    // ----- Collections -----

    /// Adds a pre-built trait object to the collection of `T`.
    pub fn add_trait_implementation<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> DiResult<()> {
        self.register_collection_item(key_of_trait::<T>(), Registration::trait_instance(value))
    }

    /// Adds a factory-built trait object to the collection of `T`.
    pub fn add_trait_collection_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register_collection_item(
            key_of_trait::<T>(),
            Registration::trait_factory(factory).with_lifestyle(lifestyle),
        )
    }

    /// Adds a factory-built `T` to the collection of `T`.
    pub fn add_collection_factory<T, L, F>(&self, lifestyle: L, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        L: Lifestyle,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_collection_item(
            key_of_type::<T>(),
            Registration::factory(factory).with_lifestyle(lifestyle),
        )
    }

    // ----- Plan customization -----

    /// Runs `action` on every new instance of `T` before it is handed out.
    ///
    /// Initializers run in registration order and never on pre-built instances.
    pub fn add_initializer<T, F>(&self, action: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &ResolverContext) -> DiResult<()> + Send + Sync + 'static,
    {
        self.stage(
            || format!("add an initializer for {}", type_name::<T>()),
            |registry| registry.initializers.push(Initializer::new::<T, F>(action)),
        )
    }

    pub fn add_plan_interceptor(&self, interceptor: Arc<dyn PlanInterceptor>) -> DiResult<()> {
        self.stage(
            || "add a plan interceptor".to_string(),
            |registry| registry.interceptors.push(interceptor),
        )
    }

    /// Adds an interceptor built from two closures.
    pub fn intercept_plans<A, I>(&self, applies: A, intercept: I) -> DiResult<()>
    where
        A: Fn(&InterceptionTarget<'_>) -> bool + Send + Sync + 'static,
        I: Fn(&InterceptionTarget<'_>, PlanNode) -> DiResult<PlanNode> + Send + Sync + 'static,
    {
        self.add_plan_interceptor(Arc::new(FnInterceptor { applies, intercept }))
    }

    /// Decorates every instance whose implementation type is `T`.
    pub fn decorate_with<T, D>(&self, decorator: D) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        D: ServiceDecorator<T> + 'static,
    {
        self.add_plan_interceptor(Arc::new(DecorateService::<T, D>::new(decorator)))
    }

    /// Decorates trait objects of `T` registered as instances or trait factories.
    pub fn decorate_trait_with<T, D>(&self, decorator: D) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        D: TraitDecorator<T> + 'static,
    {
        self.add_plan_interceptor(Arc::new(DecorateTrait::<T, D>::new(decorator)))
    }

    // ----- Collaborators -----

    pub fn add_unregistered_resolver<R>(&self, resolver: R) -> DiResult<()>
    where
        R: UnregisteredTypeResolver + 'static,
    {
        self.stage(
            || "add an unregistered type resolver".to_string(),
            |registry| registry.unregistered.push(Arc::new(resolver)),
        )
    }

    pub fn add_observer(&self, observer: Arc<dyn DiObserver>) -> DiResult<()> {
        self.stage(
            || "add an observer".to_string(),
            |registry| registry.observers.add(observer),
        )
    }

    pub fn set_binding_policy<P: BindingPolicy + 'static>(&self, policy: P) -> DiResult<()> {
        self.stage(
            || "replace the binding policy".to_string(),
            |registry| registry.binding = Arc::new(policy),
        )
    }

    pub fn set_plan_compiler<C: PlanCompiler + 'static>(&self, compiler: C) -> DiResult<()> {
        self.stage(
            || "replace the plan compiler".to_string(),
            |registry| registry.compiler = Arc::new(compiler),
        )
    }

    pub fn set_scope_locator<S: ScopeLocator + 'static>(&self, locator: S) -> DiResult<()> {
        self.stage(
            || "replace the scope locator".to_string(),
            |registry| registry.locator = Arc::new(locator),
        )
    }

    /// Lets `module` register its services.
    pub fn add_module<M: ServiceModule>(&self, module: M) -> DiResult<&Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
