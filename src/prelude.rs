//! Re-exports of the types most embedders need.
//!
//! ```
//! use market_core::prelude::*;
//! ```

pub use crate::amount::Amount;
pub use crate::api::message::{InboundMessage, PrivateMessage, RawMessage, ReqId, UserOrderWire, WalletUpdate};
pub use crate::api::{Api, TradeEvent};
pub use crate::config::Config;
pub use crate::error::{MarketCoreError, Result};
pub use crate::history::{Candle, History, HistoricalTrade};
pub use crate::orderbook::{FullDepthSnapshot, LastChange, Level, Order, OrderBook, UserOrderEvent};
pub use crate::signal::{Signal, SignalError, Subscription};
pub use crate::timer::Timer;
pub use crate::transport::Transport;
pub use crate::types::{OrderStatus, Side};
