//! Compiling construction plans into factories.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::{AnyArc, ResolverContext};

use super::{Arguments, CompiledFactory, ConstructionPlan, PlanNode};

/// Turns a construction plan into a factory.
///
/// Compilation happens once per producer. Failures surface as
/// [`DiError::PlanCompilation`].
pub trait PlanCompiler: Send + Sync {
    fn compile(&self, plan: &ConstructionPlan) -> DiResult<CompiledFactory>;
}

/// Compiles each plan node into a closure, nesting them like the plan itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureCompiler;

impl PlanCompiler for ClosureCompiler {
    fn compile(&self, plan: &ConstructionPlan) -> DiResult<CompiledFactory> {
        compile_node(plan, plan.root())
    }
}

fn compile_node(plan: &ConstructionPlan, node: &PlanNode) -> DiResult<CompiledFactory> {
    let factory: CompiledFactory = match node {
        PlanNode::Constant { value, .. } => {
            let value = value.clone();
            Arc::new(move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(value.clone()) })
        }
        PlanNode::Construct {
            arguments, invoke, ..
        } => {
            let arguments = arguments
                .iter()
                .map(|argument| Ok((argument.parameter, compile_node(plan, &argument.node)?)))
                .collect::<DiResult<Vec<_>>>()?;
            let invoke = invoke.clone();
            Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                let mut resolved = Arguments::with_capacity(arguments.len());
                for (parameter, argument) in &arguments {
                    resolved.push(*parameter, argument(ctx)?);
                }
                invoke(&resolved)
            })
        }
        PlanNode::Delegate { delegate, .. } => delegate.clone(),
        PlanNode::Dependency { producer } => {
            let producer = producer.clone();
            Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                let nested = ctx.nested()?;
                producer.get_instance(&nested)
            })
        }
        PlanNode::Placeholder { parameter, .. } => {
            return Err(DiError::PlanCompilation {
                service: plan.service().display_name(),
                message: format!("parameter `{}` was never substituted", parameter),
            })
        }
        PlanNode::InjectProperties { target, properties } => {
            let target = compile_node(plan, target)?;
            let properties = properties
                .iter()
                .map(|property| {
                    Ok((
                        property.name,
                        compile_node(plan, &property.node)?,
                        property.setter.clone(),
                    ))
                })
                .collect::<DiResult<Vec<_>>>()?;
            Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                let values = properties
                    .iter()
                    .map(|(_, factory, _)| factory(ctx))
                    .collect::<DiResult<Vec<_>>>()?;
                let mut instance = target(ctx)?;
                let fresh = Arc::get_mut(&mut instance).ok_or_else(|| {
                    DiError::InvalidOperation(
                        "properties can only be injected into a freshly constructed instance".to_string(),
                    )
                })?;
                for ((name, _, setter), value) in properties.iter().zip(values) {
                    setter(&mut *fresh, value).map_err(|err| {
                        DiError::InvalidOperation(format!("injecting property `{}` failed: {}", name, err))
                    })?;
                }
                Ok(instance)
            })
        }
        PlanNode::Initialize { target, initializers } => {
            let target = compile_node(plan, target)?;
            let initializers = initializers.clone();
            Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> {
                let instance = target(ctx)?;
                for initializer in &initializers {
                    (initializer.action())(&instance, ctx)?;
                }
                Ok(instance)
            })
        }
        PlanNode::Decorate {
            target, decorator, ..
        } => {
            let target = compile_node(plan, target)?;
            let decorator = decorator.clone();
            Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> { decorator(target(ctx)?, ctx) })
        }
    };
    Ok(factory)
}
