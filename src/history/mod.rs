//! Rolling OHLCV candle series aggregated from the trade stream and seeded
//! by a one-shot history snapshot.
//!
//! Keeps a newest-first candle list with a fixed bucket/rollover rule,
//! exposing `Signal`s the same way the order book does, and lives
//! alongside `orderbook/`.

mod ohlcv;

pub use ohlcv::Candle;

use crate::amount::Amount;
use crate::signal::{emit_or_log, Signal};

/// One trade as carried by a `fullhistory` snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalTrade {
    pub date: i64,
    pub price: Amount,
    pub volume: Amount,
}

/// Candle series for one market, bucketed at a fixed `timeframe`.
pub struct History {
    /// Newest-first; index 0 is the current, possibly incomplete, candle.
    candles: Vec<Candle>,
    /// Bucket width in seconds.
    timeframe: i64,
    pub ready_history: bool,

    /// Debug chatter, logged via [`emit_or_log`] when nobody is listening.
    pub signal_debug: Signal<String>,
    /// Payload is the candle count after the mutation.
    pub signal_changed: Signal<usize>,
    pub signal_fullhistory_processed: Signal<()>,
}

impl History {
    /// Create an empty history bucketed at `timeframe` seconds.
    pub fn new(timeframe: i64) -> Self {
        assert!(timeframe > 0, "candle timeframe must be positive");
        History {
            candles: Vec::new(),
            timeframe,
            ready_history: false,
            signal_debug: Signal::new(),
            signal_changed: Signal::new(),
            signal_fullhistory_processed: Signal::new(),
        }
    }

    pub fn timeframe(&self) -> i64 {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn length(&self) -> usize {
        self.candles.len()
    }

    /// The current (newest) candle, if any.
    pub fn last_candle(&self) -> Option<Candle> {
        self.candles.first().copied()
    }

    fn bucket_of(&self, timestamp: i64) -> i64 {
        (timestamp / self.timeframe) * self.timeframe
    }

    /// Fold one non-own trade into the series.
    pub fn on_trade(&mut self, timestamp: i64, price: Amount, volume: Amount, own: bool) {
        if own {
            return;
        }
        let bucket = self.bucket_of(timestamp);
        match self.candles.first_mut() {
            Some(candle) if candle.open_time == bucket => candle.absorb(price, volume),
            _ => self.candles.insert(0, Candle::opening(bucket, price, volume)),
        }
        emit_or_log(&self.signal_debug, format!("trade folded into candle bucket {bucket}"));
        self.signal_changed.emit(self.candles.len());
    }

    /// Replace the series' overlap with a downloaded trade history,
    /// re-deriving every candle from `trades[0].date`'s bucket onward.
    pub fn apply_fullhistory(&mut self, trades: Vec<HistoricalTrade>) {
        let Some(first) = trades.first() else {
            tracing::debug!("empty history snapshot; leaving existing candles untouched");
            return;
        };
        let cutoff = self.bucket_of(first.date);
        self.candles.retain(|c| c.open_time < cutoff);

        let mut current: Option<Candle> = None;
        for trade in &trades {
            let bucket = self.bucket_of(trade.date);
            match &mut current {
                Some(candle) if candle.open_time == bucket => candle.absorb(trade.price, trade.volume),
                _ => {
                    if let Some(finished) = current.take() {
                        self.candles.insert(0, finished);
                    }
                    current = Some(Candle::opening(bucket, trade.price, trade.volume));
                }
            }
        }
        if let Some(last) = current {
            self.candles.insert(0, last);
        }

        self.ready_history = true;
        emit_or_log(&self.signal_debug, format!("fullhistory applied: {} candles", self.candles.len()));
        self.signal_fullhistory_processed.emit(());
        self.signal_changed.emit(self.candles.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: i64) -> Amount {
        Amount::from_f64(v as f64)
    }

    #[test]
    fn single_trade_opens_first_candle() {
        let mut h = History::new(60);
        h.on_trade(125, amt(10), amt(2), false);
        assert_eq!(h.length(), 1);
        let c = h.last_candle().unwrap();
        assert_eq!(c.open_time, 120);
        assert_eq!(c.open, amt(10));
        assert_eq!(c.volume, amt(2));
    }

    #[test]
    fn trade_in_same_bucket_updates_in_place() {
        let mut h = History::new(60);
        h.on_trade(120, amt(10), amt(1), false);
        h.on_trade(145, amt(12), amt(2), false);
        assert_eq!(h.length(), 1);
        let c = h.last_candle().unwrap();
        assert_eq!(c.high, amt(12));
        assert_eq!(c.low, amt(10));
        assert_eq!(c.close, amt(12));
        assert_eq!(c.volume, amt(3));
    }

    #[test]
    fn trade_in_new_bucket_prepends_candle() {
        let mut h = History::new(60);
        h.on_trade(120, amt(10), amt(1), false);
        h.on_trade(180, amt(9), amt(1), false);
        assert_eq!(h.length(), 2);
        assert_eq!(h.candles()[0].open_time, 180);
        assert_eq!(h.candles()[1].open_time, 120);
    }

    #[test]
    fn own_trades_are_ignored() {
        let mut h = History::new(60);
        h.on_trade(120, amt(10), amt(1), true);
        assert_eq!(h.length(), 0);
    }

    #[test]
    fn fullhistory_rollover_matches_scenario() {
        let mut h = History::new(60);
        h.apply_fullhistory(vec![
            HistoricalTrade { date: 120, price: amt(10), volume: amt(1) },
            HistoricalTrade { date: 145, price: amt(12), volume: amt(2) },
            HistoricalTrade { date: 180, price: amt(9), volume: amt(1) },
        ]);
        assert!(h.ready_history);
        assert_eq!(h.length(), 2);
        assert_eq!(h.candles()[0].open_time, 180);
        assert_eq!(h.candles()[0].open, amt(9));
        assert_eq!(h.candles()[0].high, amt(9));
        assert_eq!(h.candles()[0].low, amt(9));
        assert_eq!(h.candles()[0].close, amt(9));
        assert_eq!(h.candles()[0].volume, amt(1));
        assert_eq!(h.candles()[1].open_time, 120);
        assert_eq!(h.candles()[1].open, amt(10));
        assert_eq!(h.candles()[1].high, amt(12));
        assert_eq!(h.candles()[1].low, amt(10));
        assert_eq!(h.candles()[1].close, amt(12));
        assert_eq!(h.candles()[1].volume, amt(3));
    }

    #[test]
    fn fullhistory_drops_overlapping_existing_candles() {
        let mut h = History::new(60);
        h.on_trade(300, amt(5), amt(1), false);
        h.apply_fullhistory(vec![HistoricalTrade { date: 120, price: amt(10), volume: amt(1) }]);
        assert_eq!(h.length(), 1);
        assert_eq!(h.candles()[0].open_time, 120);
    }

    #[test]
    fn empty_fullhistory_snapshot_is_a_noop() {
        let mut h = History::new(60);
        h.on_trade(120, amt(10), amt(1), false);
        h.apply_fullhistory(vec![]);
        assert_eq!(h.length(), 1);
        assert!(!h.ready_history);
    }
}
