//! Container-wide settings, fixed when the container is created.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// How a diagnostic finding is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Severity {
    /// Fail the resolution.
    #[default]
    Error,
    /// Log a warning and continue.
    Warn,
    /// Do nothing.
    Ignore,
}

/// Settings applied by a [`Container`](crate::Container).
///
/// ```
/// use ferrous_container::{Container, ContainerOptions, Severity};
///
/// let options = ContainerOptions::default()
///     .with_lifestyle_mismatch(Severity::Warn)
///     .with_max_resolution_depth(64);
/// let container = Container::with_options(options);
/// assert_eq!(container.options().max_resolution_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// What happens when a consumer captures a shorter-lived dependency.
    pub lifestyle_mismatch: Severity,
    /// Deepest dependency chain a single resolution may walk.
    pub max_resolution_depth: usize,
    /// Teardown passes a scope may run before giving up on work queued during disposal.
    pub max_dispose_recursion: usize,
    /// Whether types added with `add_resolvable` are created without a registration.
    pub resolve_unregistered_concrete_types: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            lifestyle_mismatch: Severity::Error,
            max_resolution_depth: 256,
            max_dispose_recursion: 100,
            resolve_unregistered_concrete_types: true,
        }
    }
}

impl ContainerOptions {
    pub fn with_lifestyle_mismatch(mut self, severity: Severity) -> Self {
        self.lifestyle_mismatch = severity;
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn with_max_dispose_recursion(mut self, passes: usize) -> Self {
        self.max_dispose_recursion = passes;
        self
    }

    pub fn with_unregistered_concrete_types(mut self, enabled: bool) -> Self {
        self.resolve_unregistered_concrete_types = enabled;
        self
    }

    /// Parses options from JSON; missing fields keep their defaults.
    ///
    /// ```
    /// use ferrous_container::{ContainerOptions, Severity};
    ///
    /// let options = ContainerOptions::from_json_str(r#"{ "lifestyle_mismatch": "warn" }"#).unwrap();
    /// assert_eq!(options.lifestyle_mismatch, Severity::Warn);
    /// assert_eq!(options.max_dispose_recursion, 100);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> crate::DiResult<Self> {
        serde_json::from_str(json).map_err(crate::DiError::user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ContainerOptions::default();
        assert_eq!(options.lifestyle_mismatch, Severity::Error);
        assert_eq!(options.max_resolution_depth, 256);
        assert_eq!(options.max_dispose_recursion, 100);
        assert!(options.resolve_unregistered_concrete_types);
    }

    #[cfg(feature = "config")]
    #[test]
    fn rejects_malformed_json() {
        assert!(ContainerOptions::from_json_str("{ not json").is_err());
    }
}
