use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Classified kind of a failed remote operation.
///
/// Drives both the log severity of the failure and the message the
/// presentation layer picks for it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum FailureCategory {
    None,
    ServiceLogic,
    Communication,
    Timeout,
    InvalidState,
    Unknown,
}

impl FailureCategory {
    /// Transient failures get a retry affordance in the UI.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureCategory::Timeout | FailureCategory::Communication)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::None => "none",
            FailureCategory::ServiceLogic => "service_logic",
            FailureCategory::Communication => "communication",
            FailureCategory::Timeout => "timeout",
            FailureCategory::InvalidState => "invalid_state",
            FailureCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The only failure shape surfaced above the RPC layer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{category}: {message}")]
pub struct ServiceFailure {
    pub category: FailureCategory,
    pub message: String,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ServiceFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Timeout, message)
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Communication, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::InvalidState, message)
    }

    /// Originating low-level fault. For logging only.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Text safe to put in front of an end user.
    ///
    /// Server business messages pass through verbatim; every other category
    /// collapses to a fixed string so no internal detail reaches the UI.
    pub fn user_message(&self) -> &str {
        match self.category {
            FailureCategory::ServiceLogic => &self.message,
            FailureCategory::Communication => "Could not reach the server. Please try again.",
            FailureCategory::Timeout => "The server took too long to respond. Please try again.",
            FailureCategory::InvalidState => "This action is not available right now.",
            FailureCategory::None | FailureCategory::Unknown => "Something went wrong.",
        }
    }
}
