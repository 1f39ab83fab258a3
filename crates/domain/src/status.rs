//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Allowed transitions:
/// ```text
/// Pending ──► Paid ──► Processing ──► Shipped ──► Delivered
///    │          │           │                         │
///    ▼          ▼           ▼                         ▼
/// Cancelled  Refunded   Cancelled                 Refunded
/// ```
/// A transition to the same status is always permitted (no-op).
/// `Cancelled` and `Refunded` are terminal. Cancelling a `Paid` order is
/// gated by [`OrderStatus::is_cancellable`] in the cancel operation; the
/// edge table above governs the generic status update only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order created at checkout, awaiting payment.
    #[default]
    Pending,

    /// Payment method confirmed.
    Paid,

    /// Order is being fulfilled.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer.
    Delivered,

    /// Order was cancelled before shipping (terminal).
    Cancelled,

    /// Order was refunded (terminal).
    Refunded,
}

impl OrderStatus {
    /// Returns true if the edge `self -> to` is legal.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        if *self == to {
            return true;
        }
        matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Processing)
                | (OrderStatus::Paid, OrderStatus::Refunded)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Delivered, OrderStatus::Refunded)
        )
    }

    /// Returns true if the order can still be cancelled in this status.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing
        )
    }

    /// Returns true if this is a terminal status (no outgoing edges).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Parses a status string case-insensitively.
    ///
    /// Returns `None` for unrecognized strings; canonical casing is what
    /// [`OrderStatus::as_str`] produces.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }

    /// Returns the canonical status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }

    /// All known statuses, in lifecycle order.
    pub fn all() -> [OrderStatus; 7] {
        [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn allowed_edges() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Processing));
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Refunded));
        assert!(OrderStatus::Processing.can_transition(OrderStatus::Shipped));
        assert!(OrderStatus::Processing.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition(OrderStatus::Delivered));
        assert!(OrderStatus::Delivered.can_transition(OrderStatus::Refunded));
    }

    #[test]
    fn rejected_edges() {
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Processing));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Paid));
    }

    #[test]
    fn self_transition_is_always_allowed() {
        for status in OrderStatus::all() {
            assert!(status.can_transition(status), "{status} -> {status}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            for target in OrderStatus::all() {
                if target != terminal {
                    assert!(!terminal.can_transition(target), "{terminal} -> {target}");
                }
            }
        }
    }

    #[test]
    fn cancellable_statuses() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Paid.is_cancellable());
        assert!(OrderStatus::Processing.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Delivered.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
        assert!(!OrderStatus::Refunded.is_cancellable());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("PAID"), Some(OrderStatus::Paid));
        assert_eq!(OrderStatus::parse("ShIpPeD"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("unknown"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn canonical_casing_roundtrips() {
        for status in OrderStatus::all() {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
