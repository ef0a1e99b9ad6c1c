//! `Api`: the facade that owns one [`OrderBook`] and one [`History`] keyed
//! to a configured market, normalizes inbound transport messages into
//! typed events, and routes outbound commands.

pub mod message;

use crate::amount::Amount;
use crate::config::Config;
use crate::error::{MarketCoreError, Result};
use crate::history::{Candle, History, HistoricalTrade};
use crate::orderbook::{FullDepthSnapshot, Order, OrderBook, UserOrderEvent};
use crate::signal::{emit_or_log, Signal, Subscription};
use crate::transport::Transport;
use crate::types::{OrderStatus, Side};
use message::{InboundMessage, PrivateMessage, RawMessage, ReqId, UserOrderWire, WalletUpdate};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A normalized trade, re-emitted on [`Api::signal_trade`] after both
/// `OrderBook` and `History` have folded it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeEvent {
    pub timestamp: i64,
    pub price: Amount,
    pub volume: Amount,
    pub side: Side,
    pub own: bool,
}

#[derive(Debug, Default)]
struct ReadyState {
    ready_info: bool,
    /// Reset by `signal_ready`, re-armed by `signal_disconnected`.
    was_disconnected: bool,
    count_submitted: i64,
    socket_lag_micros: i64,
    /// Per-currency wallet balances, as last reported on the `wallet`
    /// private channel.
    wallet: HashMap<String, Amount>,
    /// Last `result:volume` bookkeeping, used by a strategy consumer for
    /// fee-aware order sizing.
    monthly_volume: Option<Amount>,
    trade_fee: Option<Amount>,
}

fn ewma_update(current_lag: i64, delay: i64) -> i64 {
    (current_lag * 29 + delay) / 30
}

struct ApiShared {
    config: Config,
    transport: Arc<dyn Transport>,
    orderbook: Mutex<OrderBook>,
    history: Mutex<History>,
    state: Mutex<ReadyState>,

    signal_debug: Signal<String>,
    signal_ticker: Signal<(Amount, Amount)>,
    signal_depth: Signal<(Side, Amount, Amount)>,
    signal_trade: Signal<TradeEvent>,
    signal_fulldepth: Signal<()>,
    signal_fullhistory: Signal<()>,
    signal_wallet: Signal<WalletUpdate>,
    signal_userorder: Signal<UserOrderWire>,
    signal_orderlag: Signal<i64>,
    signal_disconnected: Signal<()>,
    signal_ready: Signal<()>,
    signal_order_too_fast: Signal<()>,
}

impl ApiShared {
    fn on_connected(&self) {
        self.check_ready();
    }

    fn on_disconnected(&self) {
        self.orderbook.lock().ready_depth = false;
        self.orderbook.lock().ready_owns = false;
        self.history.lock().ready_history = false;
        let mut state = self.state.lock();
        state.ready_info = false;
        state.was_disconnected = true;
        drop(state);
        self.signal_disconnected.emit(());
    }

    fn check_ready(&self) {
        if !self.state.lock().was_disconnected {
            return;
        }
        let info_ok = self.state.lock().ready_info || !self.config.has_secret;
        let owns_ok = self.orderbook.lock().ready_owns || !self.config.has_secret;
        let depth_ok = self.orderbook.lock().ready_depth || !self.config.load_fulldepth;
        let history_ok = self.history.lock().ready_history || !self.config.load_history;
        if info_ok && owns_ok && depth_ok && history_ok {
            self.state.lock().was_disconnected = false;
            self.signal_ready.emit(());
        }
    }

    fn on_ticker(&self, bid: Amount, ask: Amount) {
        self.orderbook.lock().on_ticker(bid, ask);
        self.signal_ticker.emit((bid, ask));
    }

    fn on_fulldepth(&self, snapshot: FullDepthSnapshot) {
        self.orderbook.lock().apply_fulldepth(snapshot);
        self.signal_fulldepth.emit(());
        self.check_ready();
    }

    fn on_fullhistory(&self, trades: Vec<HistoricalTrade>) {
        self.history.lock().apply_fullhistory(trades);
        self.signal_fullhistory.emit(());
        self.check_ready();
    }

    fn update_socket_lag(&self, stamp_micros: i64) {
        let now_micros = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_micros() as i64;
        let delay = now_micros - stamp_micros;
        let mut state = self.state.lock();
        state.socket_lag_micros = ewma_update(state.socket_lag_micros, delay);
    }

    fn on_message(&self, msg: &RawMessage) {
        if let RawMessage::Json(text) = msg {
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                if let Some(stamp) = InboundMessage::stamp(&value) {
                    self.update_socket_lag(stamp);
                }
            }
        }

        let decoded = match msg {
            RawMessage::Decoded(message) => message.clone(),
            RawMessage::Json(text) => match InboundMessage::decode(text) {
                Ok(message) => message,
                Err(err) => {
                    emit_or_log(&self.signal_debug, format!("dropping malformed inbound message: {err}"));
                    return;
                }
            },
        };

        match decoded {
            InboundMessage::Ticker { bid, ask } => self.on_ticker(bid, ask),
            InboundMessage::Depth { side, price, volume } => {
                self.orderbook.lock().on_depth(side, price, volume);
                self.signal_depth.emit((side, price, volume));
            }
            InboundMessage::Trade {
                side,
                price,
                amount,
                timestamp,
                own,
            } => {
                self.orderbook.lock().on_trade(price, amount, side, own);
                self.history.lock().on_trade(timestamp, price, amount, own);
                self.signal_trade.emit(TradeEvent {
                    timestamp,
                    price,
                    volume: amount,
                    side,
                    own,
                });
            }
            InboundMessage::Chat { user, msg, .. } => emit_or_log(&self.signal_debug, format!("chat from {user}: {msg}")),
            InboundMessage::Error { message } => tracing::warn!(%message, "exchange reported an error"),
            InboundMessage::Subscribe { channel } => tracing::debug!(%channel, "subscribed to channel"),
            InboundMessage::Remark { success, message, id } => self.on_remark(success, message, id),
            InboundMessage::Result { reqid, result } => self.on_result(reqid, result),
            InboundMessage::Private(private) => self.on_private(private),
        }
    }

    fn on_private(&self, message: PrivateMessage) {
        match message {
            PrivateMessage::UserOrder(wire) => self.on_user_order(wire),
            PrivateMessage::Wallet(update) => {
                let mut state = self.state.lock();
                for (currency, balance) in &update.balances {
                    state.wallet.insert(currency.clone(), *balance);
                }
                drop(state);
                self.signal_wallet.emit(update);
            }
            PrivateMessage::Lag { stamp_micros } => {
                self.signal_orderlag.emit(stamp_micros);
            }
        }
    }

    /// Dispatches one `user_order` payload. `signal_userorder` fires on
    /// currency/base match alone, with no status filter; the
    /// `executing`/`post-pending` drop only gates the book mutation itself,
    /// the way `OrderBook`'s own subscriber filters it downstream.
    fn on_user_order(&self, wire: UserOrderWire) {
        if wire.currency != self.config.quote_currency || wire.base != self.config.base_currency {
            return;
        }
        if let Some(status) = wire.status.as_deref() {
            if status != "executing" && status != "post-pending" {
                self.orderbook.lock().apply_user_order(UserOrderEvent::Status {
                    price: wire.price,
                    volume: wire.volume,
                    side: wire.side,
                    oid: wire.oid.clone(),
                    status: OrderStatus::from_wire(status),
                });
            }
        } else {
            self.orderbook.lock().apply_user_order(UserOrderEvent::Removal {
                oid: wire.oid.clone(),
                reason: wire.reason.clone().unwrap_or_default(),
            });
        }
        self.signal_userorder.emit(wire);
        self.check_ready();
    }

    fn on_result(&self, reqid: ReqId, result: Value) {
        match reqid {
            ReqId::Info => {
                self.state.lock().ready_info = true;
                self.check_ready();
            }
            ReqId::Orders => {
                if let Some(orders) = parse_orders(&result, &self.config) {
                    self.orderbook.lock().init_own(orders);
                }
                self.check_ready();
            }
            ReqId::Volume => {
                let mut state = self.state.lock();
                if let Some(volume) = result.get("volume").and_then(Value::as_f64) {
                    state.monthly_volume = Some(Amount::from_f64(volume));
                }
                if let Some(fee) = result.get("fee").and_then(Value::as_f64) {
                    state.trade_fee = Some(Amount::from_f64(fee));
                }
            }
            ReqId::OrderLag => {
                if let Some(lag) = result.get("lag").and_then(Value::as_i64) {
                    self.signal_orderlag.emit(lag);
                }
            }
            ReqId::OrderAdd { side, price, volume } => {
                if let Some(oid) = result.get("oid").and_then(Value::as_str) {
                    self.orderbook.lock().add_own(Order::new(price, volume, side, oid, OrderStatus::Pending));
                }
            }
            ReqId::OrderCancel { oid } => tracing::debug!(%oid, "order_cancel result received"),
            ReqId::Other(raw) => tracing::debug!(%raw, "unrecognized result reqid"),
        }
    }

    /// Handles `remark.success == false`.
    fn on_remark(&self, success: bool, message: Option<String>, id: Option<String>) {
        if success {
            return;
        }
        match message.as_deref() {
            Some("Invalid call") => match id.as_deref() {
                Some("info") => self.transport.send_signed_call("info", Value::Null, "info"),
                Some("orders") => self.transport.send_signed_call("orders", Value::Null, "orders"),
                _ => tracing::debug!(?id, "invalid call remark for an unrecognized request id"),
            },
            Some("Order not found") => {
                if let Some(oid) = id {
                    self.orderbook.lock().apply_user_order(UserOrderEvent::Removal {
                        oid,
                        reason: "requested".to_string(),
                    });
                }
            }
            Some("Order amount is too low") => {
                self.state.lock().count_submitted -= 1;
            }
            Some("Too many orders placed") => {
                self.state.lock().count_submitted -= 1;
                self.signal_order_too_fast.emit(());
            }
            _ => tracing::debug!(?message, "unhandled remark"),
        }
    }

    fn order(&self, side: Side, price: Amount, volume: Amount) {
        self.state.lock().count_submitted += 1;
        self.transport.send_order_add(side, price, volume);
    }

    fn cancel_matching(&self, filter: impl Fn(&Order) -> bool) {
        let owns = self.orderbook.lock().owns().to_vec();
        for order in owns.iter().rev() {
            if !order.oid.is_empty() && filter(order) {
                self.transport.send_order_cancel(&order.oid);
            }
        }
    }
}

fn parse_orders(result: &Value, config: &Config) -> Option<Vec<Order>> {
    let array = result.as_array()?;
    Some(
        array
            .iter()
            .filter_map(|entry| {
                let currency = entry.get("currency")?.as_str()?;
                let base = entry.get("base")?.as_str()?;
                if currency != config.quote_currency || base != config.base_currency {
                    return None;
                }
                let oid = entry.get("oid")?.as_str()?.to_string();
                let side = match entry.get("type")?.as_str()? {
                    "bid" => Side::Bid,
                    "ask" => Side::Ask,
                    _ => return None,
                };
                let price = Amount::from_f64(entry.get("price")?.as_f64()?);
                let volume = Amount::from_f64(entry.get("volume")?.as_f64()?);
                let status = OrderStatus::from_wire(entry.get("status").and_then(Value::as_str).unwrap_or("open"));
                Some(Order::new(price, volume, side, oid, status))
            })
            .collect(),
    )
}

/// Facade owning one market's `OrderBook` and `History`, wired to a
/// [`Transport`] implementation.
pub struct Api {
    shared: Arc<ApiShared>,
    _recv_sub: Subscription<RawMessage>,
    _connected_sub: Subscription<()>,
    _disconnected_sub: Subscription<()>,
    _fulldepth_sub: Subscription<FullDepthSnapshot>,
    _fullhistory_sub: Subscription<Vec<HistoricalTrade>>,
    _ticker_sub: Subscription<(Amount, Amount)>,
    _debug_sub: Subscription<String>,
}

impl Api {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Api> {
        config.validate()?;
        let timeframe_seconds = config.history_timeframe_seconds();

        let shared = Arc::new(ApiShared {
            config,
            transport: transport.clone(),
            orderbook: Mutex::new(OrderBook::new()),
            history: Mutex::new(History::new(timeframe_seconds)),
            state: Mutex::new(ReadyState {
                was_disconnected: true,
                ..ReadyState::default()
            }),
            signal_debug: Signal::new(),
            signal_ticker: Signal::new(),
            signal_depth: Signal::new(),
            signal_trade: Signal::new(),
            signal_fulldepth: Signal::new(),
            signal_fullhistory: Signal::new(),
            signal_wallet: Signal::new(),
            signal_userorder: Signal::new(),
            signal_orderlag: Signal::new(),
            signal_disconnected: Signal::new(),
            signal_ready: Signal::new(),
            signal_order_too_fast: Signal::new(),
        });

        let recv_sub = {
            let shared = shared.clone();
            transport.signal_recv().connect(move |msg: &RawMessage| {
                shared.on_message(msg);
                Ok(())
            })
        };
        let connected_sub = {
            let shared = shared.clone();
            transport.signal_connected().connect(move |_| {
                shared.on_connected();
                Ok(())
            })
        };
        let disconnected_sub = {
            let shared = shared.clone();
            transport.signal_disconnected().connect(move |_| {
                shared.on_disconnected();
                Ok(())
            })
        };
        let fulldepth_sub = {
            let shared = shared.clone();
            transport.signal_fulldepth().connect(move |snapshot: &FullDepthSnapshot| {
                shared.on_fulldepth(snapshot.clone());
                Ok(())
            })
        };
        let fullhistory_sub = {
            let shared = shared.clone();
            transport.signal_fullhistory().connect(move |trades: &Vec<HistoricalTrade>| {
                shared.on_fullhistory(trades.clone());
                Ok(())
            })
        };
        let ticker_sub = {
            let shared = shared.clone();
            transport.signal_ticker().connect(move |ticker: &(Amount, Amount)| {
                shared.on_ticker(ticker.0, ticker.1);
                Ok(())
            })
        };
        // The transport's own debug chatter is passed through unchanged
        // rather than re-normalized; it is "not acted on" per
        // `Transport::signal_debug`'s contract.
        let debug_sub = {
            let shared = shared.clone();
            transport.signal_debug().connect(move |message: &String| {
                emit_or_log(&shared.signal_debug, message.clone());
                Ok(())
            })
        };

        Ok(Api {
            shared,
            _recv_sub: recv_sub,
            _connected_sub: connected_sub,
            _disconnected_sub: disconnected_sub,
            _fulldepth_sub: fulldepth_sub,
            _fullhistory_sub: fullhistory_sub,
            _ticker_sub: ticker_sub,
            _debug_sub: debug_sub,
        })
    }

    /// Feed one message directly, bypassing the transport's `signal_recv`.
    /// Useful for tests and for embedders that already have a decoded
    /// message in hand.
    pub fn on_message(&self, msg: RawMessage) {
        self.shared.on_message(&msg);
    }

    pub fn get_total_up_to(&self, price: Amount, is_ask: bool) -> (Amount, Amount) {
        self.shared.orderbook.lock().get_total_up_to(price, is_ask)
    }

    pub fn get_own_volume_at(&self, price: Amount, side: Option<Side>) -> Amount {
        self.shared.orderbook.lock().get_own_volume_at(price, side)
    }

    pub fn have_own_oid(&self, oid: &str) -> bool {
        self.shared.orderbook.lock().have_own_oid(oid)
    }

    pub fn last_candle(&self) -> Option<Candle> {
        self.shared.history.lock().last_candle()
    }

    pub fn history_length(&self) -> usize {
        self.shared.history.lock().length()
    }

    pub fn count_submitted(&self) -> i64 {
        self.shared.state.lock().count_submitted
    }

    pub fn socket_lag_micros(&self) -> i64 {
        self.shared.state.lock().socket_lag_micros
    }

    pub fn wallet_balance(&self, currency: &str) -> Option<Amount> {
        self.shared.state.lock().wallet.get(currency).copied()
    }

    pub fn monthly_volume(&self) -> Option<Amount> {
        self.shared.state.lock().monthly_volume
    }

    pub fn trade_fee(&self) -> Option<Amount> {
        self.shared.state.lock().trade_fee
    }

    pub fn buy(&self, price: Amount, volume: Amount) {
        self.shared.order(Side::Bid, price, volume);
    }

    pub fn sell(&self, price: Amount, volume: Amount) {
        self.shared.order(Side::Ask, price, volume);
    }

    pub fn cancel(&self, oid: &str) {
        self.shared.cancel_matching(|order| order.oid == oid);
    }

    pub fn cancel_by_price(&self, price: Amount) {
        self.shared.cancel_matching(|order| order.price == price);
    }

    pub fn cancel_by_type(&self, side: Option<Side>) {
        self.shared.cancel_matching(|order| side.is_none_or(|s| s == order.side));
    }

    pub fn signal_debug(&self) -> &Signal<String> {
        &self.shared.signal_debug
    }
    pub fn signal_ticker(&self) -> &Signal<(Amount, Amount)> {
        &self.shared.signal_ticker
    }
    pub fn signal_depth(&self) -> &Signal<(Side, Amount, Amount)> {
        &self.shared.signal_depth
    }
    pub fn signal_trade(&self) -> &Signal<TradeEvent> {
        &self.shared.signal_trade
    }
    pub fn signal_fulldepth(&self) -> &Signal<()> {
        &self.shared.signal_fulldepth
    }
    pub fn signal_fullhistory(&self) -> &Signal<()> {
        &self.shared.signal_fullhistory
    }
    pub fn signal_wallet(&self) -> &Signal<WalletUpdate> {
        &self.shared.signal_wallet
    }
    pub fn signal_userorder(&self) -> &Signal<UserOrderWire> {
        &self.shared.signal_userorder
    }
    pub fn signal_orderlag(&self) -> &Signal<i64> {
        &self.shared.signal_orderlag
    }
    pub fn signal_disconnected(&self) -> &Signal<()> {
        &self.shared.signal_disconnected
    }
    pub fn signal_ready(&self) -> &Signal<()> {
        &self.shared.signal_ready
    }
    pub fn signal_order_too_fast(&self) -> &Signal<()> {
        &self.shared.signal_order_too_fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTransport {
        recv: Signal<RawMessage>,
        connected: Signal<()>,
        disconnected: Signal<()>,
        debug: Signal<String>,
        fulldepth: Signal<FullDepthSnapshot>,
        fullhistory: Signal<Vec<HistoricalTrade>>,
        ticker: Signal<(Amount, Amount)>,
        sent_adds: Mutex<Vec<(Side, Amount, Amount)>>,
        sent_cancels: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            FakeTransport {
                recv: Signal::new(),
                connected: Signal::new(),
                disconnected: Signal::new(),
                debug: Signal::new(),
                fulldepth: Signal::new(),
                fullhistory: Signal::new(),
                ticker: Signal::new(),
                sent_adds: Mutex::new(Vec::new()),
                sent_cancels: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn signal_recv(&self) -> &Signal<RawMessage> {
            &self.recv
        }
        fn signal_connected(&self) -> &Signal<()> {
            &self.connected
        }
        fn signal_disconnected(&self) -> &Signal<()> {
            &self.disconnected
        }
        fn signal_debug(&self) -> &Signal<String> {
            &self.debug
        }
        fn signal_fulldepth(&self) -> &Signal<FullDepthSnapshot> {
            &self.fulldepth
        }
        fn signal_fullhistory(&self) -> &Signal<Vec<HistoricalTrade>> {
            &self.fullhistory
        }
        fn signal_ticker(&self) -> &Signal<(Amount, Amount)> {
            &self.ticker
        }
        fn start(&self) {}
        fn stop(&self) {}
        fn send_order_add(&self, side: Side, price: Amount, volume: Amount) -> String {
            self.sent_adds.lock().push((side, price, volume));
            "order_add:bid:0:0".to_string()
        }
        fn send_order_cancel(&self, oid: &str) {
            self.sent_cancels.lock().push(oid.to_string());
        }
        fn send_signed_call(&self, _endpoint: &str, _params: Value, _reqid: &str) {}
        fn set_history_last_candle(&self, _open_time: i64) {}
    }

    fn amt(v: i64) -> Amount {
        Amount::from_f64(v as f64)
    }

    fn test_api() -> (Api, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let mut config = Config::default();
        config.has_secret = false;
        let api = Api::new(config, transport.clone() as Arc<dyn Transport>).unwrap();
        (api, transport)
    }

    #[test]
    fn ewma_formula_matches_documented_weighting() {
        assert_eq!(ewma_update(0, 30), 1);
        assert_eq!(ewma_update(100, 30), 97);
    }

    #[test]
    fn ticker_message_updates_book_and_emits() {
        let (api, transport) = test_api();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_ticker().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        transport.ticker.emit((amt(100), amt(101)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn depth_and_trade_messages_flow_through_on_message() {
        let (api, _transport) = test_api();
        api.on_message(RawMessage::Json(r#"{"op":"depth","type":"ask","price":100,"volume":5}"#.to_string()));
        let (total, _) = api.get_total_up_to(amt(100), true);
        assert_eq!(total, amt(5));

        api.on_message(RawMessage::Json(
            r#"{"op":"trade","type":"bid","price":100,"amount":2,"timestamp":60}"#.to_string(),
        ));
        let (total_after, _) = api.get_total_up_to(amt(100), true);
        assert_eq!(total_after, amt(3));
        assert_eq!(api.history_length(), 1);
    }

    #[test]
    fn ready_gate_fires_once_all_conditions_met_without_secret() {
        let (api, transport) = test_api();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_ready().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        transport.fulldepth.emit(FullDepthSnapshot {
            asks: vec![(amt(101), amt(1))],
            bids: vec![(amt(99), amt(1))],
            error: None,
        });
        transport.fullhistory.emit(vec![HistoricalTrade {
            date: 60,
            price: amt(10),
            volume: amt(1),
        }]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_clears_ready_flags_and_rearms_latch() {
        let (api, transport) = test_api();
        transport.fulldepth.emit(FullDepthSnapshot {
            asks: vec![(amt(101), amt(1))],
            bids: vec![],
            error: None,
        });
        transport.fullhistory.emit(vec![HistoricalTrade {
            date: 60,
            price: amt(10),
            volume: amt(1),
        }]);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_disconnected().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        transport.disconnected.emit(());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn buy_and_sell_delegate_to_transport_and_track_count_submitted() {
        let (api, transport) = test_api();
        api.buy(amt(100), amt(1));
        api.sell(amt(101), amt(1));
        assert_eq!(transport.sent_adds.lock().len(), 2);
        assert_eq!(api.count_submitted(), 2);
    }

    #[test]
    fn cancel_by_price_only_cancels_matching_orders() {
        let (api, transport) = test_api();
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::UserOrder(UserOrderWire {
            oid: "a".into(),
            currency: "XXBT".into(),
            base: "XETH".into(),
            side: Side::Bid,
            price: amt(100),
            volume: amt(1),
            status: Some("open".into()),
            reason: None,
        }))));
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::UserOrder(UserOrderWire {
            oid: "b".into(),
            currency: "XXBT".into(),
            base: "XETH".into(),
            side: Side::Bid,
            price: amt(99),
            volume: amt(1),
            status: Some("open".into()),
            reason: None,
        }))));
        api.cancel_by_price(amt(100));
        assert_eq!(transport.sent_cancels.lock().clone(), vec!["a".to_string()]);
    }

    #[test]
    fn order_not_found_remark_routes_through_removal_path() {
        let (api, _transport) = test_api();
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::UserOrder(UserOrderWire {
            oid: "a".into(),
            currency: "XXBT".into(),
            base: "XETH".into(),
            side: Side::Bid,
            price: amt(100),
            volume: amt(1),
            status: Some("open".into()),
            reason: None,
        }))));
        assert!(api.have_own_oid("a"));
        api.on_message(RawMessage::Decoded(InboundMessage::Remark {
            success: false,
            message: Some("Order not found".to_string()),
            id: Some("a".to_string()),
        }));
        assert!(!api.have_own_oid("a"));
    }

    #[test]
    fn too_many_orders_remark_decrements_and_signals() {
        let (api, _transport) = test_api();
        api.buy(amt(100), amt(1));
        assert_eq!(api.count_submitted(), 1);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_order_too_fast().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        api.on_message(RawMessage::Decoded(InboundMessage::Remark {
            success: false,
            message: Some("Too many orders placed".to_string()),
            id: None,
        }));
        assert_eq!(api.count_submitted(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreign_market_user_order_is_fully_dropped() {
        let (api, _transport) = test_api();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_userorder().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::UserOrder(UserOrderWire {
            oid: "a".into(),
            currency: "a different market".into(),
            base: "also different".into(),
            side: Side::Bid,
            price: amt(100),
            volume: amt(1),
            status: Some("open".into()),
            reason: None,
        }))));
        assert!(!api.have_own_oid("a"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn same_market_executing_status_skips_book_mutation_but_still_signals() {
        let (api, _transport) = test_api();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _sub = api.signal_userorder().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::UserOrder(UserOrderWire {
            oid: "a".into(),
            currency: "XXBT".into(),
            base: "XETH".into(),
            side: Side::Bid,
            price: amt(100),
            volume: amt(1),
            status: Some("executing".into()),
            reason: None,
        }))));
        assert!(!api.have_own_oid("a"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wallet_update_merges_balances_by_currency() {
        let (api, _transport) = test_api();
        assert_eq!(api.wallet_balance("XXBT"), None);
        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::Wallet(WalletUpdate {
            balances: vec![("XXBT".to_string(), amt(5)), ("XETH".to_string(), amt(10))],
        }))));
        assert_eq!(api.wallet_balance("XXBT"), Some(amt(5)));
        assert_eq!(api.wallet_balance("XETH"), Some(amt(10)));

        api.on_message(RawMessage::Decoded(InboundMessage::Private(PrivateMessage::Wallet(WalletUpdate {
            balances: vec![("XXBT".to_string(), amt(7))],
        }))));
        assert_eq!(api.wallet_balance("XXBT"), Some(amt(7)));
        assert_eq!(api.wallet_balance("XETH"), Some(amt(10)));
    }

    #[test]
    fn volume_result_stores_monthly_volume_and_trade_fee() {
        let (api, _transport) = test_api();
        assert_eq!(api.monthly_volume(), None);
        assert_eq!(api.trade_fee(), None);
        api.on_message(RawMessage::Decoded(InboundMessage::Result {
            reqid: ReqId::Volume,
            result: serde_json::json!({"volume": 100.0, "fee": 0.001}),
        }));
        assert_eq!(api.monthly_volume(), Some(Amount::from_f64(100.0)));
        assert_eq!(api.trade_fee(), Some(Amount::from_f64(0.001)));
    }
}
