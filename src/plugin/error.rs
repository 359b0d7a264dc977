//! Plugin Error Types
//!
//! Failure kinds that may cross the execution boundary between host and plugin.

use thiserror::Error;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Failure kinds observable by the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// Bad input to a configuration or recording call
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Re-configuration, double recording or another lifecycle misuse
    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    /// Cooperative cancellation was observed
    #[error("Plugin execution cancelled")]
    Cancelled,

    /// The plugin cannot continue; the message chain is meaningful to the host
    #[error("Plugin execution failed: {}", messages.join(": "))]
    ExecutionFailed { messages: Vec<String> },

    /// Function argument or formula evaluation failure
    #[error("Formula error: {message}")]
    Formula { message: String },

    /// Plugin targets a contract API the host does not speak
    #[error("Version compatibility error: {message}")]
    VersionIncompatible { message: String },

    /// Anything else the plugin raised. Carries no cause.
    #[error("Plugin failed unexpectedly")]
    UnknownPluginFailure,
}

impl PluginError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create an illegal state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState { message: message.into() }
    }

    /// Create an execution failure with a single message
    pub fn execution_failed<S: Into<String>>(message: S) -> Self {
        Self::ExecutionFailed { messages: vec![message.into()] }
    }

    /// Create an execution failure from an outermost-first message chain
    pub fn execution_failed_chain<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ExecutionFailed { messages: messages.into_iter().map(Into::into).collect() }
    }

    /// Create a formula error
    pub fn formula<S: Into<String>>(message: S) -> Self {
        Self::Formula { message: message.into() }
    }

    /// Create a version incompatible error
    pub fn version_incompatible<S: Into<String>>(message: S) -> Self {
        Self::VersionIncompatible { message: message.into() }
    }

    /// Message chain of an execution failure, outermost first
    pub fn messages(&self) -> &[String] {
        match self {
            PluginError::ExecutionFailed { messages } => messages,
            _ => &[],
        }
    }

    /// Check if error passes through every execution boundary unchanged
    pub fn is_passthrough(&self) -> bool {
        matches!(self, PluginError::Cancelled | PluginError::ExecutionFailed { .. })
    }

    /// Check if error is a formula-domain failure. Only function plugins
    /// pass these through.
    pub fn is_formula(&self) -> bool {
        matches!(self, PluginError::Formula { .. })
    }

    /// Check if error is a synchronous programmer or lifecycle error
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self,
            PluginError::InvalidArgument { .. } |
            PluginError::IllegalState { .. } |
            PluginError::VersionIncompatible { .. }
        )
    }

    /// Check if error is the cancellation kind
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PluginError::Cancelled)
    }
}
