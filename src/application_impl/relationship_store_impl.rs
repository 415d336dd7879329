use crate::application_port::{ApplyOutcome, RelationshipStore};
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

type PendingMap = HashMap<PendingKey, RelationshipEvent>;

/// Pending requests of one session, behind a single store-wide lock.
///
/// Cardinality is one user's pending requests, so the whole map shares one
/// critical section and compound-key updates are trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryRelationshipStore {
    pending: Mutex<PendingMap>,
    pending_ttl: Option<chrono::Duration>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending requests older than `ttl` are dropped on the next snapshot or
    /// `prune_expired` call.
    pub fn with_expiry(ttl: std::time::Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            pending_ttl: chrono::Duration::from_std(ttl).ok(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingMap> {
        // A panicking writer cannot leave a half-applied entry behind, every
        // mutation is a single map operation.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, pending: &mut PendingMap, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.pending_ttl else {
            return 0;
        };
        let before = pending.len();
        // A timestamp too far in the future to carry the ttl never expires.
        pending.retain(|_, event| {
            event
                .timestamp
                .checked_add_signed(ttl)
                .is_none_or(|expires_at| expires_at >= now)
        });
        before - pending.len()
    }
}

impl RelationshipStore for InMemoryRelationshipStore {
    fn apply_request(&self, event: RelationshipEvent, session: &SessionContext) -> ApplyOutcome {
        let key = event.key();

        if event.accepted {
            return match self.lock().remove(&key) {
                Some(_) => ApplyOutcome::Removed,
                None => ApplyOutcome::NotFound,
            };
        }

        if !session.is_current_user(&event.receiver_id) {
            debug!("pending request addressed to another user dropped");
            return ApplyOutcome::Misrouted;
        }

        match self.lock().entry(key) {
            Entry::Occupied(mut slot) => {
                if event.timestamp >= slot.get().timestamp {
                    slot.insert(event);
                    ApplyOutcome::Refreshed
                } else {
                    ApplyOutcome::Stale
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
                ApplyOutcome::Inserted
            }
        }
    }

    fn apply_removal(&self, event: &RelationshipEvent, session: &SessionContext) -> ApplyOutcome {
        let key = PendingKey::new(&event.sender_id, &session.user_id);
        match self.lock().remove(&key) {
            Some(_) => ApplyOutcome::Removed,
            None => ApplyOutcome::NotFound,
        }
    }

    fn snapshot(&self) -> Vec<RelationshipEvent> {
        let mut pending = self.lock();
        let expired = self.prune(&mut pending, Utc::now());
        if expired > 0 {
            debug!(expired, "expired pending requests pruned");
        }
        pending.values().cloned().collect()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.lock();
        self.prune(&mut pending, now)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn bob() -> SessionContext {
        SessionContext::new("bob")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn request_lifecycle() {
        let store = InMemoryRelationshipStore::new();

        assert!(store.apply_request_event(RelationshipEvent::pending("alice", "bob"), &bob()));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sender_id, UserId::from("alice"));

        let acceptance = RelationshipEvent::accepted("alice", "bob");
        assert!(store.apply_request_event(acceptance.clone(), &bob()));
        assert!(store.is_empty());

        // redelivered
        assert!(!store.apply_request_event(acceptance, &bob()));
    }

    #[test]
    fn acceptance_without_pending_is_noop() {
        let store = InMemoryRelationshipStore::new();
        assert_eq!(
            store.apply_request(RelationshipEvent::accepted("alice", "bob"), &bob()),
            ApplyOutcome::NotFound
        );
        assert!(store.is_empty());
    }

    #[test]
    fn misrouted_request_is_rejected() {
        let store = InMemoryRelationshipStore::new();
        store.apply_request_event(RelationshipEvent::pending("carol", "bob"), &bob());

        let spoofed = RelationshipEvent::pending("alice", "mallory");
        assert!(!store.apply_request_event(spoofed, &bob()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].sender_id, UserId::from("carol"));
    }

    #[test]
    fn receiver_match_ignores_case() {
        let store = InMemoryRelationshipStore::new();
        assert!(store.apply_request_event(RelationshipEvent::pending("alice", "BoB"), &bob()));
        assert!(store.apply_removal_event(&RelationshipEvent::pending("ALICE", "x"), &bob()));
        assert!(store.is_empty());
    }

    #[test]
    fn latest_timestamp_wins() {
        let store = InMemoryRelationshipStore::new();
        let outcomes: Vec<_> = [5, 9, 2, 9, 7]
            .into_iter()
            .map(|s| store.apply_request(RelationshipEvent::pending("alice", "bob").at(at(s)), &bob()))
            .collect();

        assert_eq!(
            outcomes,
            vec![
                ApplyOutcome::Inserted,
                ApplyOutcome::Refreshed,
                ApplyOutcome::Stale,
                ApplyOutcome::Refreshed,
                ApplyOutcome::Stale,
            ]
        );
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].timestamp, at(9));
    }

    #[test]
    fn removal_uses_session_user_as_receiver() {
        let store = InMemoryRelationshipStore::new();
        store.apply_request_event(RelationshipEvent::pending("alice", "bob"), &bob());

        // receiver on the event is ignored
        let removal = RelationshipEvent::pending("alice", "someone-else");
        assert_eq!(store.apply_removal(&removal, &bob()), ApplyOutcome::Removed);
        assert_eq!(store.apply_removal(&removal, &bob()), ApplyOutcome::NotFound);
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let store = InMemoryRelationshipStore::new();
        store.apply_request_event(RelationshipEvent::pending("alice", "bob"), &bob());

        let mut snapshot = store.snapshot();
        snapshot[0].accepted = true;
        snapshot.clear();

        let fresh = store.snapshot();
        assert_eq!(fresh.len(), 1);
        assert!(!fresh[0].accepted);
    }

    #[test]
    fn clear_empties_store() {
        let store = InMemoryRelationshipStore::new();
        store.apply_request_event(RelationshipEvent::pending("alice", "bob"), &bob());
        store.apply_request_event(RelationshipEvent::pending("carol", "bob"), &bob());
        store.clear();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn expiry_is_opt_in() {
        let store = InMemoryRelationshipStore::new();
        store.apply_request_event(RelationshipEvent::pending("alice", "bob").at(at(0)), &bob());
        assert_eq!(store.prune_expired(at(10_000_000)), 0);
        assert_eq!(store.len(), 1);

        let store = InMemoryRelationshipStore::with_expiry(Duration::from_secs(60));
        store.apply_request_event(RelationshipEvent::pending("alice", "bob").at(at(0)), &bob());
        store.apply_request_event(RelationshipEvent::pending("carol", "bob").at(at(50)), &bob());
        assert_eq!(store.prune_expired(at(100)), 1);
        assert_eq!(store.len(), 1);

        // snapshot prunes against the wall clock
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn far_future_timestamp_never_expires() {
        let frame: RelationshipNotification = serde_json::from_str(
            r#"{"SenderId":"mallory","ReceiverId":"bob","Timestamp":"+262142-12-31T00:00:00Z"}"#,
        )
        .unwrap();
        let (_, event) = frame.into_event(Utc::now()).unwrap();

        let store = InMemoryRelationshipStore::with_expiry(Duration::from_secs(604_800));
        assert!(store.apply_request_event(event, &bob()));
        store.apply_request_event(RelationshipEvent::pending("alice", "bob").at(at(0)), &bob());

        assert_eq!(store.prune_expired(Utc::now()), 1);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sender_id, UserId::from("mallory"));
        assert_eq!(store.snapshot().len(), 1);
    }
}
