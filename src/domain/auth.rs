use serde::{Deserialize, Serialize};

use crate::domain::types::UserId;

/// Identity of the user making the current request.
///
/// Resolved once per request from the session and then passed explicitly to
/// every service call that needs to attribute or authorize an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
}

impl AuthenticatedUser {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }

    /// Whether this user owns a record attributed to `owner`.
    pub fn owns(&self, owner: UserId) -> bool {
        self.id == owner
    }
}
