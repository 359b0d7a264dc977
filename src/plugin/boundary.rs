//! Execution Boundary
//!
//! Every outer plugin operation runs its inner operation through [`guard`],
//! or [`guard_formula`] for function plugins. Cancellation and execution
//! failures pass through unchanged; function plugins also pass formula
//! failures.
//! Any other returned error, and any panic, becomes
//! [`PluginError::UnknownPluginFailure`] with no cause attached: the original
//! value may be of a type the host cannot interpret, so it is dropped here.
//! Plugins are expected to have reported diagnostics through their
//! `ProgressReporter` before failing.

use std::panic::{self, AssertUnwindSafe};

use crate::plugin::error::{PluginError, PluginResult};

/// Run an inner plugin operation and normalize its failure.
///
/// `operation` names the outer operation for logging only.
pub fn guard<T, F>(operation: &str, inner: F) -> PluginResult<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    run_guarded(operation, false, inner)
}

/// Like [`guard`], but `Formula` failures also pass through
pub fn guard_formula<T, F>(operation: &str, inner: F) -> PluginResult<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    run_guarded(operation, true, inner)
}

fn run_guarded<T, F>(operation: &str, formula: bool, inner: F) -> PluginResult<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(inner)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(translate(operation, formula, error)),
        Err(_) => {
            log::warn!("Plugin operation '{}' panicked; reporting unknown plugin failure", operation);
            Err(PluginError::UnknownPluginFailure)
        }
    }
}

/// Map an inner error onto the host-visible taxonomy
fn translate(operation: &str, formula: bool, error: anyhow::Error) -> PluginError {
    match error.downcast::<PluginError>() {
        Ok(recognized) if recognized.is_passthrough() || (formula && recognized.is_formula()) => {
            log::debug!("Plugin operation '{}' stopped: {}", operation, recognized);
            recognized
        }
        Ok(misuse) if misuse.is_lifecycle_error() => {
            log::warn!(
                "Plugin operation '{}' misused the contract ({}); reporting unknown plugin failure",
                operation,
                misuse
            );
            PluginError::UnknownPluginFailure
        }
        _ => {
            log::warn!(
                "Plugin operation '{}' raised an unrecognized failure; reporting unknown plugin failure",
                operation
            );
            PluginError::UnknownPluginFailure
        }
    }
}
