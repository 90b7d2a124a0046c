//! Grouping registrations into reusable modules.

use crate::{Container, DiResult};

/// A set of registrations applied together.
///
/// # Example
///
/// ```rust
/// use ferrous_container::{Container, DiResult, Lifetime, Resolver, ServiceModule};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService {
///     config: Arc<UserConfig>,
/// }
///
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(self, container: &Container) -> DiResult<()> {
///         container.add_singleton(UserConfig::default())?;
///         container.add_factory(Lifetime::Scoped, |r| {
///             Ok(UserService { config: r.get::<UserConfig>()? })
///         })?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let container = Container::new();
/// container.add_module(UserModule)?;
///
/// let scope = container.begin_scope();
/// let service = scope.get::<UserService>()?;
/// assert!(Arc::ptr_eq(&service.config, &scope.get::<UserConfig>()?));
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Registers this module's services with `container`.
    fn register_services(self, container: &Container) -> DiResult<()>;
}

impl<F> ServiceModule for F
where
    F: FnOnce(&Container) -> DiResult<()>,
{
    fn register_services(self, container: &Container) -> DiResult<()> {
        self(container)
    }
}
