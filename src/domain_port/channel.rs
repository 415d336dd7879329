use serde_json::Value;

/// Low-level faults a channel may raise. Never leaves the RPC layer; the
/// executor classifies each one into a `ServiceFailure`.
#[derive(Debug, thiserror::Error)]
pub enum ChannelFault {
    /// Business-rule rejection raised by the server, e.g. a taken username.
    #[error("remote fault [{code}]: {message}")]
    Remote { code: String, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Frame was malformed or unexpected and carried no business payload.
    #[error("protocol fault: {0}")]
    Protocol(String),
    /// Handle is no longer usable.
    #[error("channel faulted: {0}")]
    Faulted(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Other(anyhow::Error),
}

/// Single-use handle bound to one remote endpoint.
///
/// Used for exactly one call, then either closed or aborted.
#[async_trait::async_trait]
pub trait Channel: Send {
    async fn invoke(&mut self, operation: &str, payload: Value) -> Result<Value, ChannelFault>;

    /// Graceful release.
    async fn close(&mut self) -> Result<(), ChannelFault>;

    /// Immediate release; must not block.
    fn abort(&mut self);
}

#[async_trait::async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Channel>, ChannelFault>;
}
