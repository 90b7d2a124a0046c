//! # ferrous-container
//!
//! A dependency-resolution and instance-lifecycle engine.
//!
//! ## Features
//!
//! - **Inspectable construction plans**: every service is built from a
//!   [`ConstructionPlan`] that interceptors, decorators and initializers can rewrite
//!   before it is compiled into a factory
//! - **Lifestyles**: singleton, scoped and transient, plus user-defined [`Lifestyle`]s
//! - **Lock on first use**: registration ends at the first resolution, and later
//!   registrations fail with the site that locked the container
//! - **Cycle detection**: self-referential graphs fail with the full chain instead of
//!   overflowing the stack
//! - **Lifestyle mismatch diagnostics**: singletons capturing scoped services are reported
//! - **Ordered disposal**: scopes dispose what they created in reverse order, sync or async,
//!   and keep going when a disposal fails
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_container::{Constructor, Container, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container
//!     .add_singleton(Database {
//!         connection_string: "postgres://localhost".to_string(),
//!     })
//!     .unwrap();
//! container
//!     .add_type(
//!         Lifetime::Transient,
//!         Constructor::of::<UserService>()
//!             .param::<Database>("db")
//!             .build(|args| Ok(UserService { db: args.get("db")? })),
//!     )
//!     .unwrap();
//!
//! let user_service = container.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and cached in the container's root scope
//! - **Scoped**: Created once per [`Scope`]
//! - **Transient**: Created fresh on every resolution
//!
//! ## Scoped Services
//!
//! ```rust
//! use ferrous_container::{Container, Lifetime, Resolver};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! struct RequestId(u32);
//!
//! let counter = Arc::new(AtomicU32::new(0));
//! let next = counter.clone();
//!
//! let container = Container::new();
//! container
//!     .add_factory(Lifetime::Scoped, move |_| {
//!         Ok(RequestId(next.fetch_add(1, Ordering::SeqCst)))
//!     })
//!     .unwrap();
//!
//! let scope1 = container.begin_scope();
//! let scope2 = container.begin_scope();
//!
//! assert_eq!(scope1.get_required::<RequestId>().0, 0);
//! assert_eq!(scope2.get_required::<RequestId>().0, 1);
//! assert_eq!(scope1.get_required::<RequestId>().0, 0);
//! ```

pub mod collection;
pub mod container;
pub mod descriptors;
pub mod error;
pub mod ids;
pub mod key;
pub mod lifestyle;
pub mod observer;
pub mod options;
pub mod plan;
pub mod producer;
pub mod scope;
pub mod traits;

mod cache;
mod context;
mod internal;

use std::any::Any;
use std::sync::Arc;

/// A type-erased service instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub use collection::{Registration, ServiceModule};
pub use container::{Container, ServiceIter, UnregisteredTypeResolver};
pub use context::ResolverContext;
pub use descriptors::ServiceDescriptor;
pub use error::{BoxError, DiError, DiResult, LockSite};
pub use ids::{ProducerId, RegistrationId, ScopeId};
pub use key::{key_of_trait, key_of_type, Key, TypeInfo};
pub use lifestyle::{Lifestyle, LifestyleContext, Lifetime};
pub use observer::{DiObserver, MetricsObserver, TracingObserver};
pub use options::{ContainerOptions, Severity};
pub use plan::{
    Argument, Arguments, BindingPolicy, ClosureCompiler, CompiledFactory, ConstructionPlan,
    ConstructionPlanBuilder, Constructor, ConstructorBuilder, DeclaredBindings, InjectDeclaredProperties,
    Initializer, InterceptionTarget, KnownRelationship, Parameter, ParameterOverride, PlanCompiler,
    PlanInterceptor, PlanNode, PropertyInjection, PropertySpec, Recipe, ServiceDecorator, TraitDecorator,
};
pub use producer::{BuildState, DiagnosticType, InstanceProducer, LifestyleMismatch, ServiceCast, Validity};
pub use scope::{
    AmbientScopeGuard, Disposability, Disposable, DisposalProbe, Lifecycle, NoAmbientScope, Scope,
    ScopeLocator, ThreadLocalScopeLocator,
};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
