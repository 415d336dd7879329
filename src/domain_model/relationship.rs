use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier as issued by the server.
///
/// Comparisons between identities are case-insensitive; the original
/// spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn matches(&self, other: &UserId) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }

    fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for UserId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for UserId {}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Storage identity of a pending request: the ordered `(sender, receiver)`
/// pair, case-folded.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PendingKey {
    sender: String,
    receiver: String,
}

impl PendingKey {
    pub fn new(sender: &UserId, receiver: &UserId) -> Self {
        Self {
            sender: sender.normalized(),
            receiver: receiver.normalized(),
        }
    }
}

/// A push-delivered change in the social graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEvent {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

impl RelationshipEvent {
    pub fn pending(sender: impl Into<UserId>, receiver: impl Into<UserId>) -> Self {
        Self {
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            accepted: false,
            timestamp: Utc::now(),
        }
    }

    pub fn accepted(sender: impl Into<UserId>, receiver: impl Into<UserId>) -> Self {
        Self {
            accepted: true,
            ..Self::pending(sender, receiver)
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn key(&self) -> PendingKey {
        PendingKey::new(&self.sender_id, &self.receiver_id)
    }
}

// region wire

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipEventKind {
    #[default]
    Request,
    Removal,
}

/// Frame shape delivered by the notification channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipNotification {
    #[serde(rename = "SenderId", default)]
    pub sender_id: Option<String>,
    #[serde(rename = "ReceiverId", default)]
    pub receiver_id: Option<String>,
    #[serde(rename = "Accepted", default)]
    pub accepted: bool,
    #[serde(rename = "Kind", default)]
    pub kind: RelationshipEventKind,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("missing or empty SenderId")]
    MissingSender,
    #[error("missing or empty ReceiverId")]
    MissingReceiver,
}

impl RelationshipNotification {
    /// Validates the frame at the boundary. `received_at` stands in for a
    /// frame that carries no timestamp of its own.
    pub fn into_event(
        self,
        received_at: DateTime<Utc>,
    ) -> Result<(RelationshipEventKind, RelationshipEvent), NotificationError> {
        let sender_id = self
            .sender_id
            .map(UserId)
            .filter(|id| !id.is_empty())
            .ok_or(NotificationError::MissingSender)?;
        let receiver_id = self
            .receiver_id
            .map(UserId)
            .filter(|id| !id.is_empty())
            .ok_or(NotificationError::MissingReceiver)?;

        let event = RelationshipEvent {
            sender_id,
            receiver_id,
            accepted: self.accepted,
            timestamp: self.timestamp.unwrap_or(received_at),
        };
        Ok((self.kind, event))
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_fold_case() {
        let a = RelationshipEvent::pending("Alice", "BOB");
        let b = RelationshipEvent::pending("alice", "bob");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), RelationshipEvent::pending("bob", "alice").key());
    }

    #[test]
    fn notification_requires_both_identifiers() {
        let now = Utc::now();
        let frame: RelationshipNotification =
            serde_json::from_str(r#"{"SenderId":"alice","Accepted":false}"#).unwrap();
        assert_eq!(
            frame.into_event(now).unwrap_err(),
            NotificationError::MissingReceiver
        );

        let frame: RelationshipNotification =
            serde_json::from_str(r#"{"SenderId":"  ","ReceiverId":"bob"}"#).unwrap();
        assert_eq!(
            frame.into_event(now).unwrap_err(),
            NotificationError::MissingSender
        );
    }

    #[test]
    fn notification_defaults() {
        let now = Utc::now();
        let frame: RelationshipNotification =
            serde_json::from_str(r#"{"SenderId":"alice","ReceiverId":"bob","Accepted":true}"#)
                .unwrap();
        let (kind, event) = frame.into_event(now).unwrap();
        assert_eq!(kind, RelationshipEventKind::Request);
        assert!(event.accepted);
        assert_eq!(event.timestamp, now);

        let frame: RelationshipNotification = serde_json::from_str(
            r#"{"SenderId":"alice","ReceiverId":"bob","Kind":"removal","Timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let (kind, event) = frame.into_event(now).unwrap();
        assert_eq!(kind, RelationshipEventKind::Removal);
        assert_eq!(event.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
