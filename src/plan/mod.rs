//! Construction plans.
//!
//! A [`ConstructionPlan`] is an inspectable tree of [`PlanNode`]s describing how
//! one service instance is built: which constructor runs, which producers feed
//! its parameters, and which properties, decorators and initializers apply.
//! Plans are built once per producer by a [`ConstructionPlanBuilder`], can be
//! rewritten by [`PlanInterceptor`]s, and are compiled into a [`CompiledFactory`]
//! by a [`PlanCompiler`].

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::key::{Key, TypeInfo};
use crate::producer::InstanceProducer;
use crate::{AnyArc, ResolverContext};

mod binding;
mod builder;
mod compiler;
mod interception;

pub use binding::{BindingPolicy, DeclaredBindings, InjectDeclaredProperties};
pub(crate) use builder::BuildContext;
pub use builder::{
    ConstructionPlanBuilder, Constructor, ConstructorBuilder, KnownRelationship, Parameter,
    ParameterOverride, PropertySpec, Recipe,
};
pub use compiler::{ClosureCompiler, PlanCompiler};
pub use interception::{
    InterceptionTarget, PlanInterceptor, ServiceDecorator, TraitDecorator,
};
pub(crate) use interception::{DecorateService, DecorateTrait, FnInterceptor};

/// A compiled plan: creates one instance per call.
pub type CompiledFactory = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Invokes a constructor body with its resolved arguments.
pub type ConstructFn = Arc<dyn Fn(&Arguments) -> DiResult<AnyArc> + Send + Sync>;

/// Assigns a resolved value to a property of a freshly constructed instance.
pub type PropertySetter = Arc<dyn Fn(&mut (dyn Any + Send + Sync), AnyArc) -> DiResult<()> + Send + Sync>;

/// Runs against a finished instance before it is handed out.
pub type InitializerFn = Arc<dyn for<'a> Fn(&AnyArc, &ResolverContext<'a>) -> DiResult<()> + Send + Sync>;

/// Replaces an instance with a wrapped one.
pub type DecoratorFn = Arc<dyn for<'a> Fn(AnyArc, &ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Resolved constructor arguments, in parameter order.
pub struct Arguments {
    values: SmallVec<[(&'static str, AnyArc); 4]>,
}

impl Arguments {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: SmallVec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, parameter: &'static str, value: AnyArc) {
        self.values.push((parameter, value));
    }

    fn raw(&self, parameter: &str) -> DiResult<&AnyArc> {
        self.values
            .iter()
            .find(|(name, _)| *name == parameter)
            .map(|(_, value)| value)
            .ok_or_else(|| DiError::InvalidOperation(format!("no argument named `{}`", parameter)))
    }

    /// The argument for a concrete-type parameter.
    pub fn get<T: Send + Sync + 'static>(&self, parameter: &str) -> DiResult<Arc<T>> {
        self.raw(parameter)?
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
    }

    /// The argument for a trait-object parameter.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, parameter: &str) -> DiResult<Arc<T>> {
        self.raw(parameter)?
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(DiError::TypeMismatch(type_name::<T>()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One constructor parameter and the expression producing it.
#[derive(Clone)]
pub struct Argument {
    pub parameter: &'static str,
    pub node: PlanNode,
}

/// One injected property and the expression producing its value.
#[derive(Clone)]
pub struct PropertyInjection {
    pub name: &'static str,
    pub node: PlanNode,
    pub(crate) setter: PropertySetter,
}

/// An action run on every new instance of one implementation type.
#[derive(Clone)]
pub struct Initializer {
    target: TypeInfo,
    action: InitializerFn,
}

impl Initializer {
    /// Runs `action` on every new instance whose implementation type is `T`.
    pub fn new<T, F>(action: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &ResolverContext) -> DiResult<()> + Send + Sync + 'static,
    {
        Self {
            target: TypeInfo::of::<T>(),
            action: Arc::new(move |instance: &AnyArc, ctx: &ResolverContext| -> DiResult<()> {
                let typed = instance
                    .downcast_ref::<T>()
                    .ok_or(DiError::TypeMismatch(type_name::<T>()))?;
                action(typed, ctx)
            }),
        }
    }

    pub fn target(&self) -> TypeInfo {
        self.target
    }

    pub(crate) fn applies_to(&self, implementation: &TypeInfo) -> bool {
        self.target == *implementation
    }

    pub(crate) fn action(&self) -> &InitializerFn {
        &self.action
    }
}

/// A node of a construction plan.
#[derive(Clone)]
pub enum PlanNode {
    /// A pre-built instance.
    Constant { implementation: TypeInfo, value: AnyArc },
    /// A constructor call over resolved arguments.
    Construct {
        implementation: TypeInfo,
        arguments: Vec<Argument>,
        invoke: ConstructFn,
    },
    /// A user factory delegate.
    Delegate {
        implementation: TypeInfo,
        delegate: CompiledFactory,
    },
    /// Whatever another producer yields, honoring its lifestyle.
    Dependency { producer: Arc<InstanceProducer> },
    /// A parameter awaiting an override; must be substituted before compiling.
    Placeholder { parameter: &'static str, key: Key },
    /// Property assignment on the freshly built target.
    InjectProperties {
        target: Box<PlanNode>,
        properties: Vec<PropertyInjection>,
    },
    /// Initializers run on the target in order.
    Initialize {
        target: Box<PlanNode>,
        initializers: Vec<Initializer>,
    },
    /// The target passed through a decorator.
    Decorate {
        target: Box<PlanNode>,
        label: &'static str,
        decorator: DecoratorFn,
    },
}

impl PlanNode {
    /// Producers this node depends on, in plan order.
    pub fn dependencies(&self) -> Vec<Arc<InstanceProducer>> {
        let mut found = Vec::new();
        self.collect_dependencies(&mut found);
        found
    }

    fn collect_dependencies(&self, found: &mut Vec<Arc<InstanceProducer>>) {
        match self {
            PlanNode::Dependency { producer } => found.push(producer.clone()),
            PlanNode::Construct { arguments, .. } => {
                for argument in arguments {
                    argument.node.collect_dependencies(found);
                }
            }
            PlanNode::InjectProperties { target, properties } => {
                target.collect_dependencies(found);
                for property in properties {
                    property.node.collect_dependencies(found);
                }
            }
            PlanNode::Initialize { target, .. } | PlanNode::Decorate { target, .. } => {
                target.collect_dependencies(found)
            }
            PlanNode::Constant { .. } | PlanNode::Delegate { .. } | PlanNode::Placeholder { .. } => {}
        }
    }

    /// Replaces every placeholder with the node `substitute` returns for it.
    pub(crate) fn substitute_placeholders<F>(&mut self, substitute: &mut F) -> DiResult<()>
    where
        F: FnMut(&'static str, &Key) -> DiResult<Option<PlanNode>>,
    {
        match self {
            PlanNode::Placeholder { parameter, key } => {
                if let Some(replacement) = substitute(*parameter, &*key)? {
                    *self = replacement;
                }
                Ok(())
            }
            PlanNode::Construct { arguments, .. } => {
                for argument in arguments {
                    argument.node.substitute_placeholders(substitute)?;
                }
                Ok(())
            }
            PlanNode::InjectProperties { target, properties } => {
                target.substitute_placeholders(substitute)?;
                for property in properties {
                    property.node.substitute_placeholders(substitute)?;
                }
                Ok(())
            }
            PlanNode::Initialize { target, .. } | PlanNode::Decorate { target, .. } => {
                target.substitute_placeholders(substitute)
            }
            PlanNode::Constant { .. } | PlanNode::Delegate { .. } | PlanNode::Dependency { .. } => Ok(()),
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::Constant { implementation, .. } => write!(f, "const {}", implementation),
            PlanNode::Construct {
                implementation,
                arguments,
                ..
            } => {
                write!(f, "new {}(", implementation)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", argument.parameter, argument.node)?;
                }
                f.write_str(")")
            }
            PlanNode::Delegate { implementation, .. } => write!(f, "delegate {}", implementation),
            PlanNode::Dependency { producer } => {
                write!(f, "resolve {} [{}]", producer.service(), producer.lifestyle().name())
            }
            PlanNode::Placeholder { parameter, .. } => write!(f, "?{}", parameter),
            PlanNode::InjectProperties { target, properties } => {
                write!(f, "{} {{ ", target)?;
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", property.name, property.node)?;
                }
                f.write_str(" }")
            }
            PlanNode::Initialize { target, initializers } => {
                write!(f, "initialize[{}]({})", initializers.len(), target)
            }
            PlanNode::Decorate { target, label, .. } => write!(f, "{}({})", label, target),
        }
    }
}

impl fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The realized plan of one producer.
pub struct ConstructionPlan {
    service: Key,
    implementation: TypeInfo,
    lifestyle: &'static str,
    root: PlanNode,
    intercepted: bool,
}

impl ConstructionPlan {
    pub(crate) fn new(
        service: Key,
        implementation: TypeInfo,
        lifestyle: &'static str,
        root: PlanNode,
        intercepted: bool,
    ) -> Self {
        Self {
            service,
            implementation,
            lifestyle,
            root,
            intercepted,
        }
    }

    pub fn service(&self) -> &Key {
        &self.service
    }

    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    pub fn lifestyle(&self) -> &'static str {
        self.lifestyle
    }

    pub fn root(&self) -> &PlanNode {
        &self.root
    }

    /// True when at least one interceptor rewrote the plan.
    pub fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    pub fn dependencies(&self) -> Vec<Arc<InstanceProducer>> {
        self.root.dependencies()
    }
}

impl fmt::Display for ConstructionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] = {}", self.service, self.lifestyle, self.root)
    }
}

impl fmt::Debug for ConstructionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionPlan")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifestyle", &self.lifestyle)
            .field("root", &self.root)
            .field("intercepted", &self.intercepted)
            .finish()
    }
}
