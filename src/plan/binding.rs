//! Which services feed a constructor, and which properties get injected.

use crate::key::{Key, TypeInfo};

use super::{Parameter, PropertySpec};

/// Decides how a constructor's declared dependencies bind to registrations.
pub trait BindingPolicy: Send + Sync {
    /// The key resolved for `parameter`. Defaults to the parameter's declared key.
    fn dependency_key(&self, implementation: &TypeInfo, parameter: &Parameter) -> Key {
        let _ = implementation;
        parameter.key
    }

    /// Whether `property` of `implementation` is injected after construction.
    fn select_property(&self, implementation: &TypeInfo, property: &PropertySpec) -> bool;
}

/// Binds parameters to their declared keys and injects no properties. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredBindings;

impl BindingPolicy for DeclaredBindings {
    fn select_property(&self, _implementation: &TypeInfo, _property: &PropertySpec) -> bool {
        false
    }
}

/// Injects every property a [`Constructor`](super::Constructor) declares.
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectDeclaredProperties;

impl BindingPolicy for InjectDeclaredProperties {
    fn select_property(&self, _implementation: &TypeInfo, _property: &PropertySpec) -> bool {
        true
    }
}
