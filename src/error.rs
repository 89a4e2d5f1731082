use crate::core::Phase;
use thiserror::Error;

/// Shorthand for results produced by hooks and the chain engine.
pub type Result<T> = std::result::Result<T, HookError>;

#[derive(Debug, Error)]
pub enum HookError {
    /// A lifecycle phase returned an error. Wrapped once, where the phase was invoked.
    #[error("hook '{hook}' failed in {phase}: {source}")]
    Lifecycle {
        hook: String,
        phase: Phase,
        #[source]
        source: Box<HookError>,
    },

    /// A lifecycle phase panicked.
    #[error("hook '{hook}' panicked in {phase}: {message}")]
    Panicked {
        hook: String,
        phase: Phase,
        message: String,
    },

    /// One or more children failed while the anchor ran under `FanOutPolicy::Continue`.
    #[error("anchor '{anchor}' had {} failing child hook(s)", failures.len())]
    FanOut {
        anchor: String,
        failures: Vec<HookError>,
    },

    #[error("no hook registry configured to resolve '{0}'")]
    NoRegistry(String),

    #[error("unknown hook identifier: {0}")]
    UnknownHook(String),

    #[error("failed to construct hook '{identifier}': {source}")]
    Construction {
        identifier: String,
        #[source]
        source: Box<HookError>,
    },

    #[error("{0}")]
    Failed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HookError {
    /// Convenience constructor for hook logic that just wants to bail with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }

    /// The phase this error originated in, if it came out of a lifecycle phase.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            HookError::Lifecycle { phase, .. } | HookError::Panicked { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Name of the hook this error originated in, if it came out of a lifecycle phase.
    pub fn hook(&self) -> Option<&str> {
        match self {
            HookError::Lifecycle { hook, .. } | HookError::Panicked { hook, .. } => Some(hook),
            HookError::FanOut { anchor, .. } => Some(anchor),
            _ => None,
        }
    }
}
