//! User order records.

use crate::amount::Amount;
use crate::types::{OrderStatus, Side};
use serde::{Deserialize, Serialize};

/// One of the user's own orders.
///
/// Created either by a local acknowledgement of `order_add` (pending,
/// empty-ish lifecycle) or by an inbound `user_order` event, whichever
/// arrives first. `price == Amount::ZERO` denotes a market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Limit price, or `Amount::ZERO` for a market order.
    pub price: Amount,
    /// Remaining (unfilled) volume.
    pub volume: Amount,
    pub side: Side,
    /// Opaque exchange order id. May be empty while the order is locally
    /// pending and not yet acknowledged.
    pub oid: String,
    pub status: OrderStatus,
}

impl Order {
    /// Construct a new order record.
    pub fn new(price: Amount, volume: Amount, side: Side, oid: impl Into<String>, status: OrderStatus) -> Self {
        Order {
            price,
            volume,
            side,
            oid: oid.into(),
            status,
        }
    }

    /// True if this order has no exchange-assigned id yet (still pending
    /// local acknowledgement).
    pub fn is_locally_pending(&self) -> bool {
        self.oid.is_empty()
    }

    /// True if this is a market order (price of zero denotes "fill at
    /// market").
    pub fn is_market(&self) -> bool {
        self.price.is_zero()
    }
}
