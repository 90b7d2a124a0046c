//! Diagnostics run when a producer's plan is compiled.

use std::fmt;

use crate::error::{DiError, DiResult};
use crate::lifestyle::Lifestyle;
use crate::options::Severity;
use crate::plan::ConstructionPlan;

/// Kinds of diagnostics a registration can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticType {
    /// A consumer outlives one of its dependencies.
    LifestyleMismatch,
}

/// A consumer captured a dependency with a shorter lifestyle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifestyleMismatch {
    pub consumer: &'static str,
    pub consumer_lifestyle: &'static str,
    pub dependency: &'static str,
    pub dependency_lifestyle: &'static str,
}

impl LifestyleMismatch {
    fn into_error(self) -> DiError {
        DiError::LifestyleMismatch {
            consumer: self.consumer,
            consumer_lifestyle: self.consumer_lifestyle,
            dependency: self.dependency,
            dependency_lifestyle: self.dependency_lifestyle,
        }
    }
}

impl fmt::Display for LifestyleMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) depends on {} ({})",
            self.consumer, self.consumer_lifestyle, self.dependency, self.dependency_lifestyle
        )
    }
}

/// Direct dependencies of `plan` living shorter than `lifestyle`.
///
/// Dependencies whose registration suppressed [`DiagnosticType::LifestyleMismatch`]
/// are skipped.
pub(crate) fn find_lifestyle_mismatches(
    lifestyle: &dyn Lifestyle,
    plan: &ConstructionPlan,
) -> Vec<LifestyleMismatch> {
    plan.dependencies()
        .into_iter()
        .filter(|dependency| dependency.lifestyle().length() < lifestyle.length())
        .filter(|dependency| !dependency.builder().is_suppressed(DiagnosticType::LifestyleMismatch))
        .map(|dependency| LifestyleMismatch {
            consumer: plan.service().display_name(),
            consumer_lifestyle: lifestyle.name(),
            dependency: dependency.service().display_name(),
            dependency_lifestyle: dependency.lifestyle().name(),
        })
        .collect()
}

/// Applies the configured severity to the mismatches of a plan.
///
/// `suppressed` is the consumer's own opt-out.
pub(crate) fn check_lifestyles(
    lifestyle: &dyn Lifestyle,
    plan: &ConstructionPlan,
    severity: Severity,
    suppressed: bool,
) -> DiResult<()> {
    if suppressed || severity == Severity::Ignore {
        return Ok(());
    }
    let mut mismatches = find_lifestyle_mismatches(lifestyle, plan);
    if mismatches.is_empty() {
        return Ok(());
    }
    match severity {
        Severity::Error => Err(mismatches.swap_remove(0).into_error()),
        Severity::Warn => {
            for mismatch in &mismatches {
                tracing::warn!(%mismatch, "lifestyle mismatch");
            }
            Ok(())
        }
        Severity::Ignore => Ok(()),
    }
}
