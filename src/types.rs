//! Shared small types used across the order book, history and API layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the book / of an order, as a real sum type rather than a bare
/// `"bid"`/`"ask"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Lifecycle status of a user order.
///
/// `Removed` carries the reason string the exchange reported (`"requested"`,
/// `"completed_passive"`, `"completed_active"`, or any other value the
/// exchange invents) kept open-ended rather than a closed enum, since
/// nothing here validates it; it is just forwarded. `Other` preserves any
/// status string the exchange sends that isn't one of the known ones, so
/// the engine never has to invent a meaning for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    Executing,
    PostPending,
    Removed { reason: String },
    Other(String),
}

impl OrderStatus {
    /// Parse the `status` field of a status-bearing `user_order` payload.
    pub fn from_wire(status: &str) -> OrderStatus {
        match status {
            "pending" => OrderStatus::Pending,
            "open" => OrderStatus::Open,
            "executing" => OrderStatus::Executing,
            "post-pending" => OrderStatus::PostPending,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    /// True when this is exactly the `"open"` status (used for `opened`
    /// edge detection).
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }

    /// True for the two statuses the book drops entirely without mutating
    /// `owns`.
    pub fn is_dropped_on_arrival(&self) -> bool {
        matches!(self, OrderStatus::Executing | OrderStatus::PostPending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Executing => write!(f, "executing"),
            OrderStatus::PostPending => write!(f, "post-pending"),
            OrderStatus::Removed { reason } => write!(f, "removed:{reason}"),
            OrderStatus::Other(raw) => write!(f, "{raw}"),
        }
    }
}
