//! One OHLCV candle.

use crate::amount::Amount;
use serde::{Deserialize, Serialize};

/// One candle bucket. `open_time` is always a multiple of the owning
/// history's `timeframe`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Amount,
    pub high: Amount,
    pub low: Amount,
    pub close: Amount,
    pub volume: Amount,
}

impl Candle {
    /// A fresh one-trade candle for `bucket`.
    pub fn opening(bucket: i64, price: Amount, volume: Amount) -> Self {
        Candle {
            open_time: bucket,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Fold one more trade into this candle in place.
    pub fn absorb(&mut self, price: Amount, volume: Amount) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }
}
