//! Promotional codes and discount computation.

use chrono::{DateTime, Utc};
use common::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A promotional code definition.
///
/// Codes are matched case-insensitively. Expiry is exclusive: a code whose
/// `expires_at` equals the evaluation time is already expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub code: String,
    /// Discount percentage in `[0, 100]`.
    pub percentage: f64,
    pub expires_at: DateTime<Utc>,
}

impl Promotion {
    /// Returns true if the promotion is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Validates the promotion at `now` and freezes it into a snapshot.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<AppliedPromo, DomainError> {
        if self.is_expired(now) {
            return Err(DomainError::InvalidPromo(self.code.clone()));
        }
        Ok(AppliedPromo {
            code: self.code.clone(),
            percentage: self.percentage,
        })
    }
}

/// The promo snapshot frozen onto a cart or order.
///
/// Code and percentage travel together; an absent promo is `None`, never a
/// half-populated pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedPromo {
    pub code: String,
    pub percentage: f64,
}

impl AppliedPromo {
    /// Computes the discount this promo yields against `subtotal`.
    pub fn discount(&self, subtotal: Money) -> Money {
        discount(subtotal, self.percentage)
    }
}

/// Computes a percentage discount, clamped to `[0, subtotal]`.
///
/// A non-positive subtotal or percentage yields zero; the discount can
/// never exceed the subtotal it is drawn from. Rounds half away from zero
/// to whole cents.
pub fn discount(subtotal: Money, percentage: f64) -> Money {
    if !subtotal.is_positive() || percentage <= 0.0 {
        return Money::zero();
    }
    let raw = (subtotal.cents() as f64 * percentage / 100.0).round() as i64;
    Money::from_cents(raw).clamp(Money::zero(), subtotal)
}
