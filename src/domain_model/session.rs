use crate::domain_model::UserId;

/// Identity of the authenticated user for one session.
///
/// Passed explicitly to every operation that needs to tell "mine" from
/// "theirs"; there is no process-wide current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
}

impl SessionContext {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn is_current_user(&self, other: &UserId) -> bool {
        self.user_id.matches(other)
    }
}
