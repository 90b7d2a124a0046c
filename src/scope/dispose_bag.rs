//! Pending teardown work of one scope.

use crate::error::{DiError, DiResult};

use super::{Disposable, Scope};

/// Callback registered with [`Scope::when_scope_ends`].
pub(crate) type EndAction = Box<dyn FnOnce(&Scope) -> DiResult<()> + Send>;

/// End-of-scope actions and disposables, both in registration order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    end_actions: Vec<EndAction>,
    disposables: Vec<Disposable>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposable: Disposable) {
        self.disposables.push(disposable);
    }

    pub(crate) fn push_end_action(&mut self, action: EndAction) {
        self.end_actions.push(action);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.end_actions.is_empty() && self.disposables.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.end_actions.len() + self.disposables.len()
    }

    /// Takes everything queued so far, leaving the bag empty for work queued during teardown.
    pub(crate) fn take(&mut self) -> (Vec<EndAction>, Vec<Disposable>) {
        (
            std::mem::take(&mut self.end_actions),
            std::mem::take(&mut self.disposables),
        )
    }
}

/// Runs end actions in order. The first failure abandons the rest.
pub(crate) fn run_end_actions(scope: &Scope, actions: Vec<EndAction>, errors: &mut Vec<DiError>) {
    for action in actions {
        if let Err(err) = action(scope) {
            tracing::warn!(scope = %scope.id(), error = %err, "end-of-scope action failed");
            errors.push(err);
            break;
        }
    }
}

/// Disposes synchronously, last registered first. Failures are collected, not raised.
pub(crate) fn run_sync_reverse(disposables: Vec<Disposable>, errors: &mut Vec<DiError>) {
    for disposable in disposables.into_iter().rev() {
        match disposable.sync_part() {
            Some(sync) => {
                if let Err(err) = sync.dispose() {
                    errors.push(disposal_failed(&disposable, err));
                }
            }
            None => errors.push(DiError::AsyncDisposalRequired(disposable.type_name())),
        }
    }
}

/// Disposes asynchronously, last registered first, preferring the async path.
pub(crate) async fn run_async_reverse(disposables: Vec<Disposable>, errors: &mut Vec<DiError>) {
    for disposable in disposables.into_iter().rev() {
        let outcome = match (disposable.async_part(), disposable.sync_part()) {
            (Some(asynchronous), _) => asynchronous.dispose().await,
            (None, Some(sync)) => sync.dispose(),
            (None, None) => Ok(()),
        };
        if let Err(err) = outcome {
            errors.push(disposal_failed(&disposable, err));
        }
    }
}

fn disposal_failed(disposable: &Disposable, err: DiError) -> DiError {
    tracing::warn!(type_name = disposable.type_name(), error = %err, "disposal failed");
    DiError::Disposal {
        type_name: disposable.type_name(),
        source: std::sync::Arc::new(err),
    }
}
