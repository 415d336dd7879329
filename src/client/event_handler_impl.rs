use crate::application_port::RelationshipStore;
use crate::client::{EventHandler, HandleOutcome};
use crate::domain_model::*;
use chrono::Utc;
use std::sync::Arc;

/// Boundary between the notification channel and the relationship store.
///
/// Frames missing either identity are rejected here and never reach the
/// store.
pub struct RelationshipEventHandler {
    store: Arc<dyn RelationshipStore>,
    session: SessionContext,
}

impl RelationshipEventHandler {
    pub fn new(store: Arc<dyn RelationshipStore>, session: SessionContext) -> Self {
        Self { store, session }
    }
}

#[async_trait::async_trait]
impl EventHandler for RelationshipEventHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome> {
        let frame = match serde_json::from_slice::<RelationshipNotification>(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "malformed relationship notification rejected");
                return Ok(HandleOutcome::SkipCommit);
            }
        };

        let (kind, event) = match frame.into_event(Utc::now()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(reason = %e, "relationship notification rejected");
                return Ok(HandleOutcome::SkipCommit);
            }
        };

        let outcome = match kind {
            RelationshipEventKind::Request => self.store.apply_request(event, &self.session),
            RelationshipEventKind::Removal => self.store.apply_removal(&event, &self.session),
        };
        tracing::debug!(?kind, ?outcome, "relationship notification applied");

        Ok(HandleOutcome::Commit)
    }
}
