//! Instance producers: one per resolvable service.
//!
//! A producer owns the plan and compiled factory for one service key. Plans are
//! realized and compiled lazily on first use, exactly once, under a build lock
//! that only the cold path ever takes. Afterwards `get_instance` is a cheap
//! call through the compiled factory.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::ids::{ProducerId, RegistrationId};
use crate::key::{Key, TypeInfo};
use crate::lifestyle::{Lifestyle, LifestyleContext};
use crate::plan::{BuildContext, CompiledFactory, ConstructionPlan, ConstructionPlanBuilder, KnownRelationship};
use crate::{AnyArc, ResolverContext};

mod diagnostics;
mod guard;

pub use diagnostics::{DiagnosticType, LifestyleMismatch};
use guard::CyclicDependencyGuard;

/// Converts the value cached for a registration into the shape of one service.
pub type ServiceCast = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// Compilation progress of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Uncompiled,
    Compiling,
    Compiled,
    /// The last attempt failed; the next request tries again.
    Failed,
}

/// Memoized outcome of [`InstanceProducer::validate`].
#[derive(Debug, Clone)]
pub enum Validity {
    Unknown,
    Valid,
    Invalid(DiError),
}

/// Creates instances of one service.
///
/// Producers for the same registration share a [`ConstructionPlanBuilder`] and
/// therefore their cached instances; each still realizes its own plan.
pub struct InstanceProducer {
    id: ProducerId,
    service: Key,
    builder: Arc<ConstructionPlanBuilder>,
    lifestyle: Arc<dyn Lifestyle>,
    cast: Option<ServiceCast>,
    plan: OnceCell<Arc<ConstructionPlan>>,
    factory: OnceCell<CompiledFactory>,
    state: Mutex<BuildState>,
    guard: CyclicDependencyGuard,
    validity: Mutex<Validity>,
}

impl InstanceProducer {
    pub(crate) fn new(
        id: ProducerId,
        service: Key,
        builder: Arc<ConstructionPlanBuilder>,
        lifestyle: Arc<dyn Lifestyle>,
        cast: Option<ServiceCast>,
    ) -> Self {
        Self {
            id,
            service,
            builder,
            lifestyle,
            cast,
            plan: OnceCell::new(),
            factory: OnceCell::new(),
            state: Mutex::new(BuildState::Uncompiled),
            guard: CyclicDependencyGuard::new(),
            validity: Mutex::new(Validity::Unknown),
        }
    }

    pub fn id(&self) -> ProducerId {
        self.id
    }

    pub fn service(&self) -> &Key {
        &self.service
    }

    pub fn lifestyle(&self) -> &dyn Lifestyle {
        &*self.lifestyle
    }

    pub fn builder(&self) -> &Arc<ConstructionPlanBuilder> {
        &self.builder
    }

    pub fn registration(&self) -> RegistrationId {
        self.builder.id()
    }

    pub fn implementation(&self) -> TypeInfo {
        self.builder.implementation()
    }

    pub fn build_state(&self) -> BuildState {
        *self.state.lock()
    }

    pub fn is_compiled(&self) -> bool {
        self.factory.get().is_some()
    }

    /// Returns an instance, compiling the plan on first use.
    ///
    /// Failures of the compiled factory are wrapped once with the service that
    /// failed; errors that already name their cause pass through unchanged.
    pub fn get_instance(&self, ctx: &ResolverContext) -> DiResult<AnyArc> {
        if !self.guard.is_armed() {
            if let Some(factory) = self.factory.get() {
                return self.invoke(factory, ctx);
            }
        }

        let name = self.service.display_name();
        let _frame = self.guard.enter(name)?;
        let result = self
            .compiled(ctx.container())
            .and_then(|factory| self.invoke(factory, ctx));
        match result {
            Ok(instance) => {
                self.guard.disarm();
                Ok(instance)
            }
            Err(err) => Err(err.extend_cycle(name)),
        }
    }

    /// Realizes this producer's plan without compiling it.
    pub fn build_plan(&self, container: &Container) -> DiResult<Arc<ConstructionPlan>> {
        let name = self.service.display_name();
        let _frame = self.guard.enter(name)?;
        self.realize_plan(container)
    }

    /// The realized plan, if any.
    pub fn plan(&self) -> Option<&Arc<ConstructionPlan>> {
        self.plan.get()
    }

    /// Dependencies discovered so far; empty until the plan is realized.
    pub fn relationships(&self) -> Vec<KnownRelationship> {
        if self.plan.get().is_none() {
            return Vec::new();
        }
        self.builder.relationships()
    }

    /// Compiles this producer and everything it depends on, without creating instances.
    ///
    /// The outcome is memoized; see [`validity`](Self::validity).
    pub fn validate(&self, container: &Container) -> DiResult<()> {
        match &*self.validity.lock() {
            Validity::Valid => return Ok(()),
            Validity::Invalid(err) => return Err(err.clone()),
            Validity::Unknown => {}
        }
        let outcome = self.verify_graph(container);
        if let Err(err) = &outcome {
            *self.validity.lock() = Validity::Invalid(err.clone());
        }
        outcome
    }

    pub fn is_valid(&self, container: &Container) -> bool {
        self.validate(container).is_ok()
    }

    pub fn validity(&self) -> Validity {
        self.validity.lock().clone()
    }

    /// Why the last validation failed, if it did.
    pub fn failure(&self) -> Option<DiError> {
        match &*self.validity.lock() {
            Validity::Invalid(err) => Some(err.clone()),
            _ => None,
        }
    }

    fn verify_graph(&self, container: &Container) -> DiResult<()> {
        if matches!(*self.validity.lock(), Validity::Valid) {
            return Ok(());
        }
        let name = self.service.display_name();
        let _frame = self.guard.enter(name)?;
        let outcome = self.compiled(container).and_then(|_| {
            let plan = self.realize_plan(container)?;
            for dependency in plan.dependencies() {
                dependency.verify_graph(container)?;
            }
            Ok(())
        });
        match outcome {
            Ok(()) => {
                *self.validity.lock() = Validity::Valid;
                Ok(())
            }
            Err(err) => Err(err.extend_cycle(name)),
        }
    }

    fn invoke(&self, factory: &CompiledFactory, ctx: &ResolverContext) -> DiResult<AnyArc> {
        factory(ctx).map_err(|err| self.wrap_failure(err))
    }

    fn wrap_failure(&self, err: DiError) -> DiError {
        if err.is_specific() {
            return err;
        }
        let service = self.service.display_name();
        let source = Box::new(err);
        if self.builder.is_auto_registered() {
            DiError::ImplicitRegistrationFailed { service, source }
        } else if self.builder.recipe().is_delegate() {
            DiError::DelegateFailed { service, source }
        } else {
            DiError::Activation { service, source }
        }
    }

    fn realize_plan(&self, container: &Container) -> DiResult<Arc<ConstructionPlan>> {
        self.plan
            .get_or_try_init(|| {
                let ctx = BuildContext {
                    container,
                    registry: container.registry(),
                    service: self.service,
                    lifestyle: &*self.lifestyle,
                };
                self.builder.build_plan(&ctx).map(Arc::new)
            })
            .cloned()
    }

    fn compiled(&self, container: &Container) -> DiResult<&CompiledFactory> {
        if let Some(factory) = self.factory.get() {
            return Ok(factory);
        }
        let mut state = self.state.lock();
        if let Some(factory) = self.factory.get() {
            return Ok(factory);
        }
        *state = BuildState::Compiling;
        match self.compile(container) {
            Ok(factory) => {
                *state = BuildState::Compiled;
                Ok(self.factory.get_or_init(|| factory))
            }
            Err(err) => {
                *state = BuildState::Failed;
                tracing::debug!(service = %self.service, error = %err, "instance producer failed to compile");
                Err(err)
            }
        }
    }

    fn compile(&self, container: &Container) -> DiResult<CompiledFactory> {
        let plan = self.realize_plan(container)?;
        let service = self.service.display_name();
        let raw = container
            .registry()
            .compiler
            .compile(&plan)
            .map_err(|err| match err {
                DiError::PlanCompilation { .. } => err,
                other => DiError::PlanCompilation {
                    service,
                    message: other.to_string(),
                },
            })?;

        diagnostics::check_lifestyles(
            &*self.lifestyle,
            &plan,
            container.options().lifestyle_mismatch,
            self.builder.is_suppressed(DiagnosticType::LifestyleMismatch),
        )?;

        let lifestyled = self.lifestyle.apply(LifestyleContext {
            registration: self.builder.id(),
            service: self.service,
            factory: raw,
            disposal: self.builder.disposal_policy(&self.service),
        })?;

        let factory: CompiledFactory = match &self.cast {
            None => lifestyled,
            Some(cast) => {
                let cast = cast.clone();
                Arc::new(move |ctx: &ResolverContext| -> DiResult<AnyArc> { cast(lifestyled(ctx)?) })
            }
        };
        tracing::debug!(
            producer = %self.id,
            service = %self.service,
            lifestyle = self.lifestyle.name(),
            plan = %plan,
            "instance producer compiled"
        );
        Ok(factory)
    }
}

impl fmt::Debug for InstanceProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceProducer")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("lifestyle", &self.lifestyle.name())
            .field("registration", &self.builder.id())
            .field("state", &self.build_state())
            .finish()
    }
}
