//! Cart and order ownership.

use common::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// The single owner of a cart or order.
///
/// Exactly one of a guest session or an authenticated user, made
/// unrepresentable as "both" or "neither" at the type level. An order's
/// owner is frozen at creation even if the guest later authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    /// An unauthenticated shopper, tracked by guest session id.
    Guest(SessionId),
    /// An authenticated user.
    User(UserId),
}

impl Owner {
    /// Returns the user id when owned by a user.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }

    /// Returns the session id when owned by a guest.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Owner::Guest(id) => Some(*id),
            Owner::User(_) => None,
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Guest(id) => write!(f, "guest:{id}"),
            Owner::User(id) => write!(f, "user:{id}"),
        }
    }
}
