//! Request identity extracted from trusted headers.
//!
//! Authentication proper lives outside this service; the gateway passes
//! `x-user-id`, `x-session-id` + `x-session-secret`, and `x-admin`.
//! Guest sessions are still verified against the stored secret, since
//! the session secret is issued here.

use axum::http::HeaderMap;
use common::{SessionId, UserId};
use domain::Owner;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const SESSION_SECRET_HEADER: &str = "x-session-secret";
pub const ADMIN_HEADER: &str = "x-admin";

/// The caller's resolved identity.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub session_id: Option<SessionId>,
    pub is_admin: bool,
}

impl Identity {
    /// The owner this identity acts as, users taking precedence.
    pub fn owner(&self) -> Option<Owner> {
        self.user_id
            .map(Owner::User)
            .or(self.session_id.map(Owner::Guest))
    }

    /// Requires some shopper identity.
    pub fn require_owner(&self) -> Result<Owner, ApiError> {
        self.owner().ok_or_else(|| {
            ApiError::BadRequest("request carries no shopper identity".to_string())
        })
    }

    /// Admin-only routes read as missing to everyone else.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::NotFound("Not found".to_string()))
        }
    }
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name} header")))?;
    let uuid = Uuid::parse_str(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {name} header: {e}")))?;
    Ok(Some(uuid))
}

/// Resolves the caller's identity, verifying guest session credentials.
pub async fn identify<S: Store>(
    state: &AppState<S>,
    headers: &HeaderMap,
) -> Result<Identity, ApiError> {
    let user_id = header_uuid(headers, USER_ID_HEADER)?.map(UserId::from_uuid);

    let session_id = match header_uuid(headers, SESSION_ID_HEADER)?.map(SessionId::from_uuid) {
        Some(id) => {
            let secret = headers
                .get(SESSION_SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("Missing {SESSION_SECRET_HEADER} header"))
                })?;
            Some(state.sessions.authenticate(id, secret).await?)
        }
        None => None,
    };

    let is_admin = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true" || v == "1");

    Ok(Identity {
        user_id,
        session_id,
        is_admin,
    })
}
