//! Guest session issuance and verification.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::SessionId;
use domain::GuestSession;
use store::Store;

use crate::error::{CheckoutError, Result};

/// Issues and authenticates guest sessions.
pub struct SessionService<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: Store> SessionService<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issues a new session. The secret is returned once, here, and the
    /// caller must present it on every subsequent request.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self) -> Result<GuestSession> {
        let now = Utc::now();
        let session = GuestSession::new(now, now + self.ttl);
        self.store.insert_guest_session(&session).await?;
        tracing::debug!(session_id = %session.id, "guest session issued");
        Ok(session)
    }

    /// Verifies a presented `(id, secret)` pair and touches the session.
    ///
    /// Unknown id, wrong secret, and expiry all fail the same way, so a
    /// caller cannot probe which part was wrong.
    pub async fn authenticate(&self, id: SessionId, secret: &str) -> Result<SessionId> {
        let rejected = || CheckoutError::NotFound(format!("Session not found: {id}"));

        let session = self.store.get_guest_session(id).await?.ok_or_else(rejected)?;
        let now = Utc::now();
        if session.is_expired(now) || !session.secret_matches(secret) {
            return Err(rejected());
        }
        self.store.touch_guest_session(id, now).await?;
        Ok(id)
    }
}
