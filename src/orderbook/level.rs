//! One price level on one side of the book.

use crate::amount::Amount;

/// A single price point on one side of the book, carrying the aggregate
/// public resting volume and this user's share of it, plus a cumulative
/// cache filled in on demand by [`super::book::OrderBook::get_total_up_to`].
///
/// A level is created on first observation of a non-zero aggregate volume
/// at the price and destroyed once both `volume` and `own_volume` reach
/// zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: Amount,
    /// Aggregate resting volume from the public book.
    pub volume: Amount,
    /// Sum of this user's open limit-order volume at this price/side.
    pub own_volume: Amount,
    /// Cumulative base volume from the top of the book through this level,
    /// inclusive. Only meaningful when this level's index is `<=` the
    /// side's valid cache watermark.
    pub(crate) cache_total_vol: Amount,
    /// Cumulative quote volume, same validity rule as `cache_total_vol`.
    pub(crate) cache_total_vol_quote: Amount,
}

impl Level {
    /// Create a new level at `price` with the given aggregate volume and no
    /// own volume yet.
    pub fn new(price: Amount, volume: Amount) -> Self {
        Level {
            price,
            volume,
            own_volume: Amount::ZERO,
            cache_total_vol: Amount::ZERO,
            cache_total_vol_quote: Amount::ZERO,
        }
    }

    /// True once both the public and own volume at this level have been
    /// fully drained, meaning the level should be dropped from the book.
    pub fn is_empty(&self) -> bool {
        self.volume.is_zero() && self.own_volume.is_zero()
    }
}
