//! The transport adaptor contract consumed by [`crate::api::Api`].
//!
//! Exchange-specific transport clients (WebSocket/poll/socket.io adaptors)
//! are out of scope for this crate; this trait is the seam a concrete
//! adaptor plugs into. Kept as a plain, object-safe, synchronous trait, no
//! `async fn` in the trait and no `async-trait`, since ordinary blocking
//! calls back onto a [`Signal`] are how the whole engine already
//! communicates.

use crate::amount::Amount;
use crate::api::message::RawMessage;
use crate::history::HistoricalTrade;
use crate::orderbook::FullDepthSnapshot;
use crate::signal::Signal;
use crate::types::Side;

/// Everything the core needs from an exchange transport.
///
/// Implementations own the actual socket/poll loop and translate
/// exchange-specific wire formats into these normalized shapes; this crate
/// never speaks the exchange's wire protocol directly.
pub trait Transport: Send + Sync {
    /// Fires for every inbound application message, decoded or not.
    fn signal_recv(&self) -> &Signal<RawMessage>;
    fn signal_connected(&self) -> &Signal<()>;
    fn signal_disconnected(&self) -> &Signal<()>;
    /// Debug-only chatter the transport wants logged, not acted on.
    fn signal_debug(&self) -> &Signal<String>;
    fn signal_fulldepth(&self) -> &Signal<FullDepthSnapshot>;
    fn signal_fullhistory(&self) -> &Signal<Vec<HistoricalTrade>>;
    /// `(bid, ask)`.
    fn signal_ticker(&self) -> &Signal<(Amount, Amount)>;

    /// Open the connection and begin delivering signals.
    fn start(&self);
    /// Close the connection. Idempotent.
    fn stop(&self);

    /// Submit a new order. Returns the request id the transport will tag
    /// its eventual `result` reply with, so `Api` can correlate the reply
    /// back to this command.
    fn send_order_add(&self, side: Side, price: Amount, volume: Amount) -> String;
    fn send_order_cancel(&self, oid: &str);
    /// A generic signed private-API call, used for the account-info and
    /// own-orders bootstrap requests.
    fn send_signed_call(&self, endpoint: &str, params: serde_json::Value, reqid: &str);

    /// Record the open_time of the newest candle so a reconnecting
    /// transport can ask the exchange for history starting there instead
    /// of refetching everything.
    fn set_history_last_candle(&self, open_time: i64);
}
