//! Cooperative Cancellation
//!
//! Plugins poll a [`CancellationCheck`] between discrete units of work so a
//! stop request from the host is observed promptly. The check never clears
//! the signal; the token owner does.

use tokio_util::sync::CancellationToken;

use crate::plugin::error::{PluginError, PluginResult};

/// Probe handed to every inner plugin operation
#[derive(Debug, Clone, Default)]
pub struct CancellationCheck {
    token: CancellationToken,
}

impl CancellationCheck {
    /// Probe bound to the given token
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Probe that is never cancelled
    pub fn never() -> Self {
        Self::default()
    }

    /// Return `Cancelled` if a stop was requested, otherwise do nothing.
    pub fn check(&self) -> PluginResult<()> {
        if self.token.is_cancelled() {
            Err(PluginError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Probe observing a child of this token
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token() }
    }
}

impl From<CancellationToken> for CancellationCheck {
    fn from(token: CancellationToken) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_until_cancelled() {
        let token = CancellationToken::new();
        let check = CancellationCheck::new(token.clone());

        assert!(check.check().is_ok());
        assert!(check.check().is_ok());

        token.cancel();
        assert_eq!(check.check(), Err(PluginError::Cancelled));
        // The probe does not acknowledge the signal
        assert_eq!(check.check(), Err(PluginError::Cancelled));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_observes_parent() {
        let token = CancellationToken::new();
        let check = CancellationCheck::new(token.clone());
        let child = check.child();

        token.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_never_cancelled() {
        assert!(CancellationCheck::never().check().is_ok());
    }
}
