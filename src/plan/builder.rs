//! Turning a registration recipe into a construction plan.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::{Container, Registry};
use crate::error::{DiError, DiResult};
use crate::ids::RegistrationId;
use crate::key::{key_of_trait, key_of_type, Key, TypeInfo};
use crate::lifestyle::Lifestyle;
use crate::producer::{DiagnosticType, InstanceProducer};
use crate::scope::{Disposability, DisposalPolicy};
use crate::AnyArc;

use super::{
    Argument, Arguments, CompiledFactory, ConstructFn, ConstructionPlan, InterceptionTarget,
    PlanNode, PropertyInjection, PropertySetter,
};

/// A constructor parameter: its name and the service it asks for.
#[derive(Debug, Clone, Copy)]
pub struct Parameter {
    pub name: &'static str,
    pub key: Key,
}

/// A settable property a binding policy may choose to inject.
#[derive(Clone)]
pub struct PropertySpec {
    pub name: &'static str,
    pub key: Key,
    pub(crate) setter: PropertySetter,
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

/// Explicit constructor metadata for an implementation type.
///
/// Declares the parameters the constructor needs, settable properties, and the
/// body that builds the instance from resolved [`Arguments`].
///
/// ```
/// use ferrous_container::{Constructor, Container, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database;
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// let container = Container::new();
/// container.add_singleton(Database).unwrap();
/// container
///     .add_type(
///         Lifetime::Transient,
///         Constructor::of::<UserService>()
///             .param::<Database>("db")
///             .build(|args| Ok(UserService { db: args.get("db")? })),
///     )
///     .unwrap();
///
/// let service = container.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&service.db, &container.get_required::<Database>()));
/// ```
#[derive(Clone)]
pub struct Constructor {
    implementation: TypeInfo,
    parameters: Vec<Parameter>,
    properties: Vec<PropertySpec>,
    invoke: ConstructFn,
}

impl Constructor {
    /// Starts describing the constructor of `T`.
    pub fn of<T: Send + Sync + 'static>() -> ConstructorBuilder<T> {
        ConstructorBuilder {
            parameters: Vec::new(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("implementation", &self.implementation)
            .field("parameters", &self.parameters)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Builder returned by [`Constructor::of`].
pub struct ConstructorBuilder<T> {
    parameters: Vec<Parameter>,
    properties: Vec<PropertySpec>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ConstructorBuilder<T> {
    /// A parameter resolved as the concrete service `D`.
    pub fn param<D: Send + Sync + 'static>(self, name: &'static str) -> Self {
        self.param_key(name, key_of_type::<D>())
    }

    /// A parameter resolved as the trait service `D`.
    pub fn param_trait<D: ?Sized + Send + Sync + 'static>(self, name: &'static str) -> Self {
        self.param_key(name, key_of_trait::<D>())
    }

    /// A parameter resolved under an explicit key, e.g. a named registration.
    pub fn param_key(mut self, name: &'static str, key: Key) -> Self {
        self.parameters.push(Parameter { name, key });
        self
    }

    /// A settable property of concrete type `D`.
    pub fn property<D, F>(mut self, name: &'static str, set: F) -> Self
    where
        D: Send + Sync + 'static,
        F: Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    {
        let setter: PropertySetter = Arc::new(move |target: &mut (dyn Any + Send + Sync), value: AnyArc| -> DiResult<()> {
            let target = target
                .downcast_mut::<T>()
                .ok_or(DiError::TypeMismatch(type_name::<T>()))?;
            let value = value
                .downcast::<D>()
                .map_err(|_| DiError::TypeMismatch(type_name::<D>()))?;
            set(target, value);
            Ok(())
        });
        self.properties.push(PropertySpec {
            name,
            key: key_of_type::<D>(),
            setter,
        });
        self
    }

    /// A settable property holding the trait service `D`.
    pub fn property_trait<D, F>(mut self, name: &'static str, set: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    {
        let setter: PropertySetter = Arc::new(move |target: &mut (dyn Any + Send + Sync), value: AnyArc| -> DiResult<()> {
            let target = target
                .downcast_mut::<T>()
                .ok_or(DiError::TypeMismatch(type_name::<T>()))?;
            let value = value
                .downcast_ref::<Arc<D>>()
                .cloned()
                .ok_or(DiError::TypeMismatch(type_name::<D>()))?;
            set(target, value);
            Ok(())
        });
        self.properties.push(PropertySpec {
            name,
            key: key_of_trait::<D>(),
            setter,
        });
        self
    }

    /// Finishes the description with the constructor body.
    pub fn build<F>(self, body: F) -> Constructor
    where
        F: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Constructor {
            implementation: TypeInfo::of::<T>(),
            parameters: self.parameters,
            properties: self.properties,
            invoke: Arc::new(move |args: &Arguments| -> DiResult<AnyArc> { Ok(Arc::new(body(args)?)) }),
        }
    }
}

/// How a registration creates its instances.
#[derive(Clone)]
pub enum Recipe {
    /// Call a constructor whose parameters are resolved from the container.
    Constructor(Constructor),
    /// Call a user factory.
    Delegate {
        implementation: TypeInfo,
        delegate: CompiledFactory,
    },
    /// Hand out a pre-built instance. The container never disposes it.
    Instance { implementation: TypeInfo, value: AnyArc },
}

impl Recipe {
    pub fn implementation(&self) -> TypeInfo {
        match self {
            Recipe::Constructor(constructor) => constructor.implementation,
            Recipe::Delegate { implementation, .. } | Recipe::Instance { implementation, .. } => {
                *implementation
            }
        }
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self, Recipe::Delegate { .. })
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipe::Constructor(constructor) => f.debug_tuple("Constructor").field(constructor).finish(),
            Recipe::Delegate { implementation, .. } => write!(f, "Delegate({})", implementation),
            Recipe::Instance { implementation, .. } => write!(f, "Instance({})", implementation),
        }
    }
}

/// Replacement for one constructor parameter of a single registration.
#[derive(Clone)]
pub enum ParameterOverride {
    /// Always pass this value.
    Value { implementation: TypeInfo, value: AnyArc },
    /// Resolve this key instead of the parameter's own.
    Key(Key),
}

impl ParameterOverride {
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        ParameterOverride::Value {
            implementation: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn trait_value<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        ParameterOverride::Value {
            implementation: TypeInfo::of::<Arc<T>>(),
            value: Arc::new(value),
        }
    }

    pub fn key(key: Key) -> Self {
        ParameterOverride::Key(key)
    }
}

impl fmt::Debug for ParameterOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterOverride::Value { implementation, .. } => write!(f, "Value({})", implementation),
            ParameterOverride::Key(key) => write!(f, "Key({})", key),
        }
    }
}

/// A dependency edge discovered while building a plan.
#[derive(Clone)]
pub struct KnownRelationship {
    /// Implementation type of the consumer.
    pub implementation: TypeInfo,
    /// Lifestyle the consumer was built under.
    pub lifestyle: &'static str,
    /// Parameter or property that needed the dependency.
    pub parameter: &'static str,
    pub dependency: Arc<InstanceProducer>,
}

impl fmt::Debug for KnownRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownRelationship")
            .field("implementation", &self.implementation)
            .field("lifestyle", &self.lifestyle)
            .field("parameter", &self.parameter)
            .field("dependency", &self.dependency.service())
            .finish()
    }
}

/// What a builder sees of the container while building one plan.
pub(crate) struct BuildContext<'a> {
    pub(crate) container: &'a Container,
    pub(crate) registry: &'a Registry,
    pub(crate) service: Key,
    pub(crate) lifestyle: &'a dyn Lifestyle,
}

/// Produces construction plans for one registration.
///
/// Builders are shared: every producer created for the same registration uses
/// the same builder, and scopes cache instances under the builder's
/// [`RegistrationId`]. Settings such as parameter overrides and suppressed
/// diagnostics therefore apply to all of them.
pub struct ConstructionPlanBuilder {
    id: RegistrationId,
    recipe: Recipe,
    disposability: Disposability,
    suppress_disposal: bool,
    overrides: HashMap<&'static str, ParameterOverride>,
    suppressed: Vec<DiagnosticType>,
    auto_registered: bool,
    relationships: Mutex<Vec<KnownRelationship>>,
}

impl ConstructionPlanBuilder {
    pub(crate) fn new(id: RegistrationId, recipe: Recipe) -> Self {
        // pre-built instances are owned by the caller
        let suppress_disposal = matches!(recipe, Recipe::Instance { .. });
        Self {
            id,
            recipe,
            disposability: Disposability::Never,
            suppress_disposal,
            overrides: HashMap::new(),
            suppressed: Vec::new(),
            auto_registered: false,
            relationships: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_disposability(mut self, disposability: Disposability) -> Self {
        self.disposability = disposability;
        self
    }

    pub(crate) fn suppress_disposal(mut self, suppress: bool) -> Self {
        self.suppress_disposal |= suppress;
        self
    }

    pub(crate) fn with_overrides(mut self, overrides: Vec<(&'static str, ParameterOverride)>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub(crate) fn with_suppressed(mut self, suppressed: Vec<DiagnosticType>) -> Self {
        self.suppressed.extend(suppressed);
        self
    }

    pub(crate) fn auto_registered(mut self) -> Self {
        self.auto_registered = true;
        self
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn implementation(&self) -> TypeInfo {
        self.recipe.implementation()
    }

    /// True for registrations the container created for an unregistered type.
    pub fn is_auto_registered(&self) -> bool {
        self.auto_registered
    }

    pub fn is_suppressed(&self, diagnostic: DiagnosticType) -> bool {
        self.suppressed.contains(&diagnostic)
    }

    /// Dependency edges recorded by the plans built so far.
    pub fn relationships(&self) -> Vec<KnownRelationship> {
        self.relationships.lock().clone()
    }

    pub(crate) fn disposal_policy(&self, service: &Key) -> DisposalPolicy {
        DisposalPolicy::new(
            service.display_name(),
            self.disposability.clone(),
            self.suppress_disposal,
        )
    }

    /// Builds a fresh plan for `ctx.service`.
    ///
    /// The base node comes from the recipe. Selected properties wrap it, then
    /// each applicable interceptor rewrites it in registration order, then
    /// initializers wrap it. Overridden parameters are placeholders until the
    /// final substitution step.
    pub(crate) fn build_plan(&self, ctx: &BuildContext<'_>) -> DiResult<ConstructionPlan> {
        let implementation = self.implementation();
        let mut root = match &self.recipe {
            Recipe::Instance { value, .. } => PlanNode::Constant {
                implementation,
                value: value.clone(),
            },
            Recipe::Delegate { delegate, .. } => PlanNode::Delegate {
                implementation,
                delegate: delegate.clone(),
            },
            Recipe::Constructor(constructor) => self.constructor_node(ctx, constructor)?,
        };

        let target = InterceptionTarget {
            service: &ctx.service,
            implementation,
            lifestyle: ctx.lifestyle,
            recipe: &self.recipe,
        };
        let mut intercepted = false;
        for interceptor in &ctx.registry.interceptors {
            if !interceptor.applies_to(&target) {
                continue;
            }
            root = interceptor.intercept(&target, root).map_err(|err| match err {
                DiError::Configuration { .. } => err,
                other => DiError::Configuration {
                    service: ctx.service.display_name(),
                    message: format!("plan interceptor failed: {}", other),
                },
            })?;
            intercepted = true;
        }

        if !matches!(self.recipe, Recipe::Instance { .. }) {
            let initializers: Vec<_> = ctx
                .registry
                .initializers
                .iter()
                .filter(|initializer| initializer.applies_to(&implementation))
                .cloned()
                .collect();
            if !initializers.is_empty() {
                root = PlanNode::Initialize {
                    target: Box::new(root),
                    initializers,
                };
            }
        }

        root.substitute_placeholders(&mut |parameter, _key| match self.overrides.get(parameter) {
            Some(ParameterOverride::Value { implementation, value }) => Ok(Some(PlanNode::Constant {
                implementation: *implementation,
                value: value.clone(),
            })),
            Some(ParameterOverride::Key(key)) => self.dependency_node(ctx, parameter, *key).map(Some),
            None => Ok(None),
        })?;

        Ok(ConstructionPlan::new(
            ctx.service,
            implementation,
            ctx.lifestyle.name(),
            root,
            intercepted,
        ))
    }

    fn constructor_node(&self, ctx: &BuildContext<'_>, constructor: &Constructor) -> DiResult<PlanNode> {
        let binding = &ctx.registry.binding;
        let mut arguments = Vec::with_capacity(constructor.parameters.len());
        for parameter in &constructor.parameters {
            let node = if self.overrides.contains_key(parameter.name) {
                PlanNode::Placeholder {
                    parameter: parameter.name,
                    key: parameter.key,
                }
            } else {
                let key = binding.dependency_key(&constructor.implementation, parameter);
                self.dependency_node(ctx, parameter.name, key)?
            };
            arguments.push(Argument {
                parameter: parameter.name,
                node,
            });
        }

        let node = PlanNode::Construct {
            implementation: constructor.implementation,
            arguments,
            invoke: constructor.invoke.clone(),
        };

        let properties = constructor
            .properties
            .iter()
            .filter(|property| binding.select_property(&constructor.implementation, property))
            .map(|property| {
                Ok(PropertyInjection {
                    name: property.name,
                    node: self.dependency_node(ctx, property.name, property.key)?,
                    setter: property.setter.clone(),
                })
            })
            .collect::<DiResult<Vec<_>>>()?;
        if properties.is_empty() {
            return Ok(node);
        }
        Ok(PlanNode::InjectProperties {
            target: Box::new(node),
            properties,
        })
    }

    fn dependency_node(&self, ctx: &BuildContext<'_>, parameter: &'static str, key: Key) -> DiResult<PlanNode> {
        let producer = ctx
            .container
            .root_producer(&key)?
            .ok_or(DiError::MissingDependency {
                consumer: self.implementation().name(),
                parameter,
                dependency: key.display_name(),
            })?;
        self.record(KnownRelationship {
            implementation: self.implementation(),
            lifestyle: ctx.lifestyle.name(),
            parameter,
            dependency: producer.clone(),
        });
        Ok(PlanNode::Dependency { producer })
    }

    fn record(&self, relationship: KnownRelationship) {
        let mut relationships = self.relationships.lock();
        let known = relationships.iter().any(|existing| {
            existing.lifestyle == relationship.lifestyle
                && existing.parameter == relationship.parameter
                && existing.dependency.id() == relationship.dependency.id()
        });
        if !known {
            relationships.push(relationship);
        }
    }
}

impl fmt::Debug for ConstructionPlanBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionPlanBuilder")
            .field("id", &self.id)
            .field("recipe", &self.recipe)
            .field("disposability", &self.disposability)
            .field("auto_registered", &self.auto_registered)
            .finish()
    }
}
