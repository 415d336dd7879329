use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// What a single event did to the pending-request map.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ApplyOutcome {
    Inserted,
    /// Same pair already pending; overwritten with the newer event.
    Refreshed,
    /// Same pair already pending with a newer timestamp; kept as is.
    Stale,
    Removed,
    NotFound,
    /// Pending request addressed to someone other than the session user.
    Misrouted,
}

impl ApplyOutcome {
    pub fn accepted(self) -> bool {
        matches!(
            self,
            ApplyOutcome::Inserted
                | ApplyOutcome::Refreshed
                | ApplyOutcome::Stale
                | ApplyOutcome::Removed
        )
    }
}

/// Local view of the session user's pending friend requests.
///
/// Fed by an at-least-once, unordered push channel: duplicate, stale and
/// misrouted events are absorbed and reported through return values, never
/// raised.
pub trait RelationshipStore: Send + Sync {
    fn apply_request(&self, event: RelationshipEvent, session: &SessionContext) -> ApplyOutcome;

    fn apply_removal(&self, event: &RelationshipEvent, session: &SessionContext) -> ApplyOutcome;

    /// Independent copy of the pending requests; order is unspecified.
    fn snapshot(&self) -> Vec<RelationshipEvent>;

    fn clear(&self);

    /// Drops entries past the configured expiry. Returns how many went.
    fn prune_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_request_event(&self, event: RelationshipEvent, session: &SessionContext) -> bool {
        self.apply_request(event, session).accepted()
    }

    fn apply_removal_event(&self, event: &RelationshipEvent, session: &SessionContext) -> bool {
        self.apply_removal(event, session).accepted()
    }
}
