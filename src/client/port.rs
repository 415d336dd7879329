use std::sync::Arc;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandleOutcome {
    Commit,
    /// Frame rejected at the boundary; dropped without touching local state.
    SkipCommit,
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome>;
}

#[async_trait::async_trait]
pub trait EventConsumer: Send + Sync {
    async fn run(&self, handler: Arc<dyn EventHandler>) -> anyhow::Result<()>;
}
