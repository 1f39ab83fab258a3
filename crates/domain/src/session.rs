//! Guest session entity.

use chrono::{DateTime, Utc};
use common::SessionId;
use serde::{Deserialize, Serialize};

/// An unauthenticated shopper's session.
///
/// The session id associates carts and orders; the secret is a bearer
/// credential checked on every request and never used as a lookup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestSession {
    pub id: SessionId,
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GuestSession {
    /// Creates a new session with a random secret, valid until
    /// `expires_at`.
    pub fn new(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            secret: uuid::Uuid::new_v4().simple().to_string(),
            created_at: now,
            last_seen_at: now,
            expires_at,
        }
    }

    /// Returns true if the session is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Checks the presented bearer secret.
    pub fn secret_matches(&self, presented: &str) -> bool {
        // Both sides are random UUIDs of fixed length; compare without
        // short-circuiting on the first mismatched byte.
        if self.secret.len() != presented.len() {
            return false;
        }
        self.secret
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
