//! Two-sided order book: depth reconciliation, own-order overlay and the
//! cumulative-volume cache.
//!
//! A struct owning both sides plus scalar bests/totals, applying
//! depth/ticker/trade/user_order/fulldepth updates from an external feed.
//! Matching-engine semantics are out of scope: this type has no
//! `submit`/`match`, only reconciliation of externally-reported state.

use crate::amount::Amount;
use crate::orderbook::level::Level;
use crate::orderbook::order::Order;
use crate::signal::{emit_or_log, Signal};
use crate::types::{OrderStatus, Side};

/// One of the two normalized `user_order` shapes this book acts on, already
/// resolved at the API boundary into a sum type rather than being
/// reconstructed here from field presence. An event for a different market
/// never reaches this type; that filtering happens before it is built.
#[derive(Debug, Clone)]
pub enum UserOrderEvent {
    /// A new-or-updated order report (limit or market).
    Status {
        price: Amount,
        volume: Amount,
        side: Side,
        oid: String,
        status: OrderStatus,
    },
    /// A removal (cancel or fill). `reason` is one of `"requested"`,
    /// `"completed_passive"`, `"completed_active"`, or any other string the
    /// exchange sends; carried verbatim.
    Removal { oid: String, reason: String },
}

/// A one-shot snapshot of the entire public book.
#[derive(Debug, Clone, Default)]
pub struct FullDepthSnapshot {
    /// Ascending by price.
    pub asks: Vec<(Amount, Amount)>,
    /// Descending by price.
    pub bids: Vec<(Amount, Amount)>,
    /// Set when the exchange reported an error instead of a usable
    /// snapshot; when set, the book is left untouched.
    pub error: Option<String>,
}

/// Which side changed and by how much, for UI highlighting. Overwritten on
/// every book mutation, cleared on every ticker event.
#[derive(Debug, Clone, Copy)]
pub struct LastChange {
    pub side: Side,
    pub price: Amount,
    pub voldiff: Amount,
}

/// The order book: two sorted sides, the user's own orders, and the
/// signals consumers subscribe to for every category of change.
pub struct OrderBook {
    /// Descending by price; index 0 is the best bid.
    bids: Vec<Level>,
    /// Ascending by price; index 0 is the best ask.
    asks: Vec<Level>,
    /// Unordered list of the user's own orders.
    owns: Vec<Order>,

    best_bid: Option<Amount>,
    best_ask: Option<Amount>,
    total_ask: Amount,
    total_bid: Amount,

    /// Highest index on the ask side whose cumulative cache is known
    /// correct; `-1` means no level is valid.
    valid_ask_cache: isize,
    /// Same, for the bid side.
    valid_bid_cache: isize,

    last_change: Option<LastChange>,

    pub ready_depth: bool,
    pub ready_owns: bool,

    /// Debug chatter, logged via [`emit_or_log`] when nobody is listening.
    pub signal_debug: Signal<String>,
    pub signal_changed: Signal<()>,
    pub signal_fulldepth_processed: Signal<()>,
    pub signal_owns_initialized: Signal<()>,
    pub signal_owns_changed: Signal<()>,
    pub signal_own_added: Signal<Order>,
    pub signal_own_removed: Signal<(Order, String)>,
    pub signal_own_opened: Signal<Order>,
    pub signal_own_volume: Signal<(Order, Amount)>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Create a new, empty order book.
    pub fn new() -> Self {
        OrderBook {
            bids: Vec::new(),
            asks: Vec::new(),
            owns: Vec::new(),
            best_bid: None,
            best_ask: None,
            total_ask: Amount::ZERO,
            total_bid: Amount::ZERO,
            valid_ask_cache: -1,
            valid_bid_cache: -1,
            last_change: None,
            ready_depth: false,
            ready_owns: false,
            signal_debug: Signal::new(),
            signal_changed: Signal::new(),
            signal_fulldepth_processed: Signal::new(),
            signal_owns_initialized: Signal::new(),
            signal_owns_changed: Signal::new(),
            signal_own_added: Signal::new(),
            signal_own_removed: Signal::new(),
            signal_own_opened: Signal::new(),
            signal_own_volume: Signal::new(),
        }
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn owns(&self) -> &[Order] {
        &self.owns
    }

    pub fn best_bid(&self) -> Option<Amount> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<Amount> {
        self.best_ask
    }

    pub fn total_ask(&self) -> Amount {
        self.total_ask
    }

    pub fn total_bid(&self) -> Amount {
        self.total_bid
    }

    pub fn last_change(&self) -> Option<LastChange> {
        self.last_change
    }

    fn levels(&self, side: Side) -> &Vec<Level> {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut Vec<Level> {
        match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        }
    }

    /// Binary search one side for `price`. Returns the insertion index
    /// (where a new level would go to keep the side sorted) and, if an
    /// exact match exists, its current volume.
    fn find_level(&self, side: Side, price: Amount) -> (usize, Option<Amount>) {
        let levels = self.levels(side);
        let index = match side {
            Side::Ask => levels.partition_point(|l| l.price < price),
            Side::Bid => levels.partition_point(|l| l.price > price),
        };
        let existing = levels.get(index).filter(|l| l.price == price).map(|l| l.volume);
        (index, existing)
    }

    fn invalidate_cache_from(&mut self, side: Side, index: isize) {
        match side {
            Side::Ask => self.valid_ask_cache = self.valid_ask_cache.min(index),
            Side::Bid => self.valid_bid_cache = self.valid_bid_cache.min(index),
        }
    }

    fn update_totals(&mut self, side: Side, voldiff: Amount, price: Amount) {
        match side {
            Side::Ask => self.total_ask += voldiff,
            Side::Bid => self.total_bid += voldiff.mul_scaled(price),
        }
    }

    /// Refresh `best_bid`/`best_ask` from index 0 of `side`, if that side is
    /// non-empty. A side that just became empty keeps its previous scalar.
    fn update_best(&mut self, side: Side) {
        match side {
            Side::Ask => {
                if let Some(level) = self.asks.first() {
                    self.best_ask = Some(level.price);
                }
            }
            Side::Bid => {
                if let Some(level) = self.bids.first() {
                    self.best_bid = Some(level.price);
                }
            }
        }
    }

    fn record_last_change(&mut self, side: Side, price: Amount, voldiff: Amount) {
        self.last_change = Some(LastChange { side, price, voldiff });
    }

    /// Remove levels from `side` that have been crossed by a ticker or
    /// trade price arriving ahead of the matching depth delta.
    fn repair_crossed_asks(&mut self, ask: Amount) {
        while let Some(top) = self.asks.first() {
            if top.price < ask {
                self.total_ask -= top.volume;
                self.asks.remove(0);
                self.valid_ask_cache = -1;
            } else {
                break;
            }
        }
    }

    fn repair_crossed_bids(&mut self, bid: Amount) {
        while let Some(top) = self.bids.first() {
            if top.price > bid {
                self.total_bid -= top.volume.mul_scaled(top.price);
                self.bids.remove(0);
                self.valid_bid_cache = -1;
            } else {
                break;
            }
        }
    }

    /// Apply an incoming ticker update: set the scalar bests, then repair
    /// any levels the depth stream hasn't caught up to yet.
    pub fn on_ticker(&mut self, bid: Amount, ask: Amount) {
        self.best_bid = Some(bid);
        self.best_ask = Some(ask);
        self.last_change = None;
        self.repair_crossed_asks(ask);
        self.repair_crossed_bids(bid);
        emit_or_log(&self.signal_debug, format!("ticker bid={bid} ask={ask}"));
        self.signal_changed.emit(());
    }

    /// Apply an incoming depth delta. `total_vol` is the absolute resting
    /// volume at `price`, not a delta. A no-op delta (zero-volume on a
    /// level we don't have, or a volume identical to what we already have)
    /// returns without emitting `signal_changed`.
    pub fn on_depth(&mut self, side: Side, price: Amount, total_vol: Amount) {
        let (index, existing) = self.find_level(side, price);
        let voldiff = match existing {
            None if total_vol.is_zero() => return,
            Some(old) if total_vol.is_zero() => {
                self.levels_mut(side).remove(index);
                -old
            }
            Some(old) => {
                if total_vol == old {
                    return;
                }
                self.levels_mut(side)[index].volume = total_vol;
                total_vol - old
            }
            None => {
                self.levels_mut(side).insert(index, Level::new(price, total_vol));
                total_vol
            }
        };

        self.update_totals(side, voldiff, price);
        self.update_best(side);
        self.invalidate_cache_from(side, index as isize - 1);
        self.record_last_change(side, price, voldiff);
        emit_or_log(&self.signal_debug, format!("depth {side} {price} voldiff={voldiff}"));
        self.signal_changed.emit(());
    }

    /// Consume the top level of `book_side` at `price` by `volume`, folding
    /// any overshoot into the reported `voldiff` rather than letting the
    /// level go negative.
    fn consume_top(&mut self, book_side: Side, price: Amount, volume: Amount) {
        match book_side {
            Side::Ask => self.repair_crossed_asks(price),
            Side::Bid => self.repair_crossed_bids(price),
        }

        let top = match book_side {
            Side::Ask => self.asks.first().copied(),
            Side::Bid => self.bids.first().copied(),
        };
        let Some(top) = top else { return };
        if top.price != price {
            return;
        }

        let remaining = top.volume.saturating_sub(volume);
        let consumed = top.volume - remaining;
        let voldiff = -consumed;
        if remaining.is_zero() {
            self.levels_mut(book_side).remove(0);
        } else {
            self.levels_mut(book_side)[0].volume = remaining;
        }

        self.update_totals(book_side, voldiff, price);
        self.invalidate_cache_from(book_side, -1);
        self.update_best(book_side);
        self.record_last_change(book_side, price, voldiff);
    }

    /// Apply an incoming trade. Own trades are ignored here; the
    /// `user_order` channel is the authoritative source for the user's own
    /// fills.
    pub fn on_trade(&mut self, price: Amount, volume: Amount, side: Side, own: bool) {
        if !own {
            match side {
                // side == bid means an ask order was hit.
                Side::Bid => self.consume_top(Side::Ask, price, volume),
                // side == ask means a bid order was hit.
                Side::Ask => self.consume_top(Side::Bid, price, volume),
            }
        }
        emit_or_log(&self.signal_debug, format!("trade {side} {price} x {volume} own={own}"));
        self.signal_changed.emit(());
    }

    /// Sum of this user's open-order volume at `price`, optionally
    /// restricted to one side. Always computed from the authoritative
    /// `owns` list, never from a level's cached `own_volume`; that cache
    /// is derived from this, not the other way round.
    pub fn get_own_volume_at(&self, price: Amount, side: Option<Side>) -> Amount {
        self.owns
            .iter()
            .filter(|o| o.price == price && side.is_none_or(|s| s == o.side))
            .map(|o| o.volume)
            .sum()
    }

    pub fn have_own_oid(&self, oid: &str) -> bool {
        self.owns.iter().any(|o| o.oid == oid)
    }

    /// Recompute a level's `own_volume` from `owns` and drop the level if
    /// it is now fully empty (no public or own volume left). Market orders
    /// (`price == 0`) never touch the book's levels.
    fn recompute_level_own_volume(&mut self, side: Side, price: Amount) {
        if price.is_zero() {
            return;
        }
        let own_volume = self.get_own_volume_at(price, Some(side));
        let (index, existing) = self.find_level(side, price);
        match existing {
            Some(_) => {
                let levels = self.levels_mut(side);
                levels[index].own_volume = own_volume;
                if levels[index].is_empty() {
                    levels.remove(index);
                }
            }
            None => {
                if own_volume.is_zero() {
                    return;
                }
                let mut level = Level::new(price, Amount::ZERO);
                level.own_volume = own_volume;
                self.levels_mut(side).insert(index, level);
                self.invalidate_cache_from(side, index as isize - 1);
            }
        }
    }

    /// Insert a new own order and notify. No-op (including no signals) if
    /// the oid is already known, which is what protects against a
    /// duplicate-ack race between a local order_add and an inbound
    /// user_order reporting the same order.
    pub fn add_own(&mut self, order: Order) {
        if self.have_own_oid(&order.oid) {
            return;
        }
        self.owns.push(order.clone());
        self.recompute_level_own_volume(order.side, order.price);
        self.signal_own_added.emit(order);
        self.signal_changed.emit(());
        self.signal_owns_changed.emit(());
    }

    /// Apply one normalized `user_order` event.
    pub fn apply_user_order(&mut self, event: UserOrderEvent) {
        match event {
            UserOrderEvent::Status {
                price,
                volume,
                side,
                oid,
                status,
            } => {
                if status.is_dropped_on_arrival() {
                    return;
                }
                match self.owns.iter().position(|o| o.oid == oid) {
                    Some(pos) => {
                        let opened = !self.owns[pos].status.is_open() && status.is_open();
                        let voldiff = volume - self.owns[pos].volume;
                        self.owns[pos].volume = volume;
                        self.owns[pos].status = status;
                        let order = self.owns[pos].clone();

                        self.recompute_level_own_volume(side, price);

                        if opened {
                            self.signal_own_opened.emit(order.clone());
                        }
                        if !voldiff.is_zero() {
                            self.signal_own_volume.emit((order, voldiff));
                        }
                        emit_or_log(&self.signal_debug, format!("user_order {oid} status={}", self.owns[pos].status));
                        self.signal_changed.emit(());
                        self.signal_owns_changed.emit(());
                    }
                    None => {
                        // Unknown oid: either genuinely new, or the
                        // user_order beat the local order_add ack to us.
                        // Either way, treat it as the authoritative add.
                        self.add_own(Order::new(price, volume, side, oid, status));
                    }
                }
            }
            UserOrderEvent::Removal { oid, reason } => {
                let Some(pos) = self.owns.iter().position(|o| o.oid == oid) else {
                    return; // unknown oid: ignored silently
                };
                let order = self.owns[pos].clone();
                if order.is_market() && reason.contains("passive") {
                    // A market order's "completed_passive" is immediately
                    // followed by a "completed_active" for the same fill;
                    // wait for that one instead.
                    return;
                }
                self.owns.remove(pos);
                self.recompute_level_own_volume(order.side, order.price);
                emit_or_log(&self.signal_debug, format!("user_order {oid} removed: {reason}"));
                self.signal_own_removed.emit((order, reason));
                self.signal_changed.emit(());
                self.signal_owns_changed.emit(());
            }
        }
    }

    /// Replace `owns` wholesale with the authoritative list downloaded
    /// after connect. `orders` must already be filtered to the configured
    /// market by the caller.
    pub fn init_own(&mut self, orders: Vec<Order>) {
        self.owns.clear();
        for level in self.bids.iter_mut().chain(self.asks.iter_mut()) {
            level.own_volume = Amount::ZERO;
        }
        for order in orders {
            if !self.have_own_oid(&order.oid) {
                let (side, price) = (order.side, order.price);
                self.owns.push(order);
                self.recompute_level_own_volume(side, price);
            }
        }
        self.ready_owns = true;
        emit_or_log(&self.signal_debug, format!("own orders initialized: {} orders", self.owns.len()));
        self.signal_changed.emit(());
        self.signal_owns_initialized.emit(());
        self.signal_owns_changed.emit(());
    }

    fn upsert_snapshot_level(&mut self, side: Side, price: Amount, volume: Amount) {
        let (index, existing) = self.find_level(side, price);
        match existing {
            // Last occurrence wins on a duplicate price.
            Some(_) => self.levels_mut(side)[index].volume = volume,
            None => self.levels_mut(side).insert(index, Level::new(price, volume)),
        }
    }

    /// Replace the whole book with a full-depth snapshot. On an
    /// error-flagged snapshot the book is left untouched and `ready_depth`
    /// stays false.
    pub fn apply_fulldepth(&mut self, snapshot: FullDepthSnapshot) {
        self.bids.clear();
        self.asks.clear();
        self.total_ask = Amount::ZERO;
        self.total_bid = Amount::ZERO;

        if let Some(error) = snapshot.error {
            tracing::warn!(%error, "fulldepth snapshot carried an error flag; book left untouched");
            return;
        }

        for (price, volume) in snapshot.asks {
            self.upsert_snapshot_level(Side::Ask, price, volume);
        }
        for (price, volume) in snapshot.bids {
            self.upsert_snapshot_level(Side::Bid, price, volume);
        }
        self.total_ask = self.asks.iter().map(|l| l.volume).sum();
        self.total_bid = self.bids.iter().map(|l| l.volume.mul_scaled(l.price)).sum();

        // Reconcile own_volume against the fresh snapshot. An own order
        // whose price is absent from the snapshot gets a fresh zero-public-
        // volume level created for it rather than being left unaccounted
        // for (see DESIGN.md).
        for order in self.owns.clone() {
            self.recompute_level_own_volume(order.side, order.price);
        }

        self.update_best(Side::Bid);
        self.update_best(Side::Ask);
        self.valid_ask_cache = -1;
        self.valid_bid_cache = -1;
        self.ready_depth = true;
        emit_or_log(
            &self.signal_debug,
            format!("fulldepth applied: {} bids, {} asks", self.bids.len(), self.asks.len()),
        );
        self.signal_fulldepth_processed.emit(());
        self.signal_changed.emit(());
    }

    /// Cumulative base and quote volume from the top of `side` down
    /// through (and including) the deepest level still at-or-through
    /// `price`. Lazily fills and extends the per-side cache, never
    /// recomputing a prefix that is already known valid.
    pub fn get_total_up_to(&mut self, price: Amount, is_ask: bool) -> (Amount, Amount) {
        let side = if is_ask { Side::Ask } else { Side::Bid };
        let watermark = if is_ask { self.valid_ask_cache } else { self.valid_bid_cache };

        let count = match side {
            Side::Ask => self.asks.partition_point(|l| l.price <= price),
            Side::Bid => self.bids.partition_point(|l| l.price >= price),
        };
        let needed_level = count as isize - 1;
        if needed_level < 0 {
            return (Amount::ZERO, Amount::ZERO);
        }

        if needed_level <= watermark {
            let level = self.levels(side)[needed_level as usize];
            return (level.cache_total_vol, level.cache_total_vol_quote);
        }

        let (mut total, mut total_quote) = if watermark == -1 {
            (Amount::ZERO, Amount::ZERO)
        } else {
            let level = self.levels(side)[watermark as usize];
            (level.cache_total_vol, level.cache_total_vol_quote)
        };

        let levels = self.levels_mut(side);
        for i in (watermark + 1)..=needed_level {
            let level = &mut levels[i as usize];
            total += level.volume;
            total_quote += level.volume.mul_scaled(level.price);
            level.cache_total_vol = total;
            level.cache_total_vol_quote = total_quote;
        }

        match side {
            Side::Ask => self.valid_ask_cache = needed_level,
            Side::Bid => self.valid_bid_cache = needed_level,
        }
        (total, total_quote)
    }
}
