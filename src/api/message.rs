//! Normalized inbound message envelope and the `result` request-correlation
//! key.
//!
//! Both the outer channel multiplex and the `result` correlation key are
//! tagged unions decoded once and matched exhaustively: [`InboundMessage`]
//! for the outer `op` dispatch and [`ReqId`] for the `result` correlation
//! key, rather than resolving a handler name dynamically per message.

use crate::amount::Amount;
use crate::error::MarketCoreError;
use crate::types::Side;
use serde_json::Value;

/// A message as handed to [`crate::api::Api::on_message`]: either the raw
/// JSON text a transport received off the wire, or an already-decoded
/// envelope.
#[derive(Debug, Clone)]
pub enum RawMessage {
    Json(String),
    Decoded(InboundMessage),
}

/// One of the shapes the exchange multiplexes through a single channel,
/// tagged by the wire `op` field.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Ticker {
        bid: Amount,
        ask: Amount,
    },
    Depth {
        side: Side,
        price: Amount,
        volume: Amount,
    },
    Trade {
        side: Side,
        price: Amount,
        amount: Amount,
        timestamp: i64,
        own: bool,
    },
    Chat {
        kind: String,
        user: String,
        rep: String,
        msg: String,
    },
    Error {
        message: String,
    },
    Subscribe {
        channel: String,
    },
    Remark {
        success: bool,
        message: Option<String>,
        id: Option<String>,
    },
    Result {
        reqid: ReqId,
        result: Value,
    },
    Private(PrivateMessage),
}

/// The `private` sub-channel, dispatched on its own `private` field.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivateMessage {
    UserOrder(UserOrderWire),
    Wallet(WalletUpdate),
    /// Microsecond-resolution lag sample. Left unreconciled against
    /// `result:order_lag`'s units deliberately; the two channels report
    /// lag at different resolutions and nothing in this crate normalizes
    /// between them.
    Lag { stamp_micros: i64 },
}

/// The raw `user_order` payload, before it is normalized into
/// [`crate::orderbook::UserOrderEvent`] and filtered to the configured
/// market by [`crate::api::Api`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserOrderWire {
    pub oid: String,
    pub currency: String,
    pub base: String,
    pub side: Side,
    pub price: Amount,
    pub volume: Amount,
    /// Present for a status-bearing message; absent for a removal.
    pub status: Option<String>,
    /// Present for a removal; absent for a status-bearing message.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletUpdate {
    /// `(currency, balance)` pairs, carried verbatim from the wire.
    pub balances: Vec<(String, Amount)>,
}

/// A structured stand-in for the `:`-delimited `reqid` string `result`
/// replies are correlated by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReqId {
    Info,
    Orders,
    Volume,
    OrderLag,
    OrderAdd { side: Side, price: Amount, volume: Amount },
    OrderCancel { oid: String },
    /// Anything not matching a known shape; carried so an unrecognized
    /// reply can still be logged instead of silently dropped.
    Other(String),
}

impl ReqId {
    pub fn parse(raw: &str) -> ReqId {
        match raw {
            "info" => return ReqId::Info,
            "orders" => return ReqId::Orders,
            "volume" => return ReqId::Volume,
            "order_lag" => return ReqId::OrderLag,
            _ => {}
        }
        if let Some(rest) = raw.strip_prefix("order_add:") {
            let parts: Vec<&str> = rest.splitn(3, ':').collect();
            if let [side, price, volume] = parts[..] {
                let parsed = (parse_side(side), price.parse::<f64>(), volume.parse::<f64>());
                if let (Some(side), Ok(price), Ok(volume)) = parsed {
                    return ReqId::OrderAdd {
                        side,
                        price: Amount::from_f64(price),
                        volume: Amount::from_f64(volume),
                    };
                }
            }
        } else if let Some(oid) = raw.strip_prefix("order_cancel:") {
            return ReqId::OrderCancel { oid: oid.to_string() };
        }
        ReqId::Other(raw.to_string())
    }
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "bid" => Some(Side::Bid),
        "ask" => Some(Side::Ask),
        _ => None,
    }
}

impl InboundMessage {
    /// Decode a JSON-text message into one of the tagged envelope shapes.
    pub fn decode(json: &str) -> Result<InboundMessage, MarketCoreError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<InboundMessage, MarketCoreError> {
        let op = value
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| MarketCoreError::MalformedMessage("missing \"op\" field".to_string()))?;

        match op {
            "ticker" => Ok(InboundMessage::Ticker {
                bid: decimal_field(value, "bid")?,
                ask: decimal_field(value, "ask")?,
            }),
            "depth" => Ok(InboundMessage::Depth {
                side: side_field(value, "type")?,
                price: decimal_field(value, "price")?,
                volume: decimal_field(value, "volume")?,
            }),
            "trade" => Ok(InboundMessage::Trade {
                side: side_field(value, "type")?,
                price: decimal_field(value, "price")?,
                amount: decimal_field(value, "amount")?,
                timestamp: int_field(value, "timestamp")?,
                own: value.get("own").and_then(Value::as_bool).unwrap_or(false),
            }),
            "chat" => Ok(InboundMessage::Chat {
                kind: string_field(value, "type").unwrap_or_default(),
                user: string_field(value, "user").unwrap_or_default(),
                rep: string_field(value, "rep").unwrap_or_default(),
                msg: string_field(value, "msg").unwrap_or_default(),
            }),
            "error" => Ok(InboundMessage::Error {
                message: string_field(value, "message").unwrap_or_default(),
            }),
            "subscribe" => Ok(InboundMessage::Subscribe {
                channel: string_field(value, "channel").unwrap_or_default(),
            }),
            "remark" => Ok(InboundMessage::Remark {
                success: value.get("success").and_then(Value::as_bool).unwrap_or(false),
                message: string_field(value, "message"),
                id: string_field(value, "id"),
            }),
            "result" => {
                let reqid = string_field(value, "id")
                    .ok_or_else(|| MarketCoreError::MalformedMessage("result message missing \"id\"".to_string()))?;
                Ok(InboundMessage::Result {
                    reqid: ReqId::parse(&reqid),
                    result: value.get("result").cloned().unwrap_or(Value::Null),
                })
            }
            "private" => Self::decode_private(value),
            other => Err(MarketCoreError::MalformedMessage(format!("unrecognized op \"{other}\""))),
        }
    }

    fn decode_private(value: &Value) -> Result<InboundMessage, MarketCoreError> {
        let private = value
            .get("private")
            .and_then(Value::as_str)
            .ok_or_else(|| MarketCoreError::MalformedMessage("private message missing \"private\" field".to_string()))?;

        let private_message = match private {
            "user_order" => PrivateMessage::UserOrder(UserOrderWire {
                oid: string_field(value, "oid").unwrap_or_default(),
                currency: string_field(value, "currency").unwrap_or_default(),
                base: string_field(value, "base").unwrap_or_default(),
                side: side_field(value, "type")?,
                price: decimal_field(value, "price")?,
                volume: decimal_field(value, "volume")?,
                status: string_field(value, "status"),
                reason: string_field(value, "reason"),
            }),
            "wallet" => {
                let balances = value
                    .get("balance")
                    .and_then(Value::as_object)
                    .map(|map| {
                        map.iter()
                            .filter_map(|(currency, amount)| amount.as_f64().map(|a| (currency.clone(), Amount::from_f64(a))))
                            .collect()
                    })
                    .unwrap_or_default();
                PrivateMessage::Wallet(WalletUpdate { balances })
            }
            "lag" => PrivateMessage::Lag {
                stamp_micros: int_field(value, "age")?,
            },
            other => return Err(MarketCoreError::MalformedMessage(format!("unrecognized private channel \"{other}\""))),
        };
        Ok(InboundMessage::Private(private_message))
    }

    /// Microsecond `stamp` field used for the socket-lag EWMA, if this
    /// message carries one.
    pub fn stamp(value: &Value) -> Option<i64> {
        value.get("stamp").and_then(Value::as_i64)
    }
}

fn decimal_field(value: &Value, field: &str) -> Result<Amount, MarketCoreError> {
    value
        .get(field)
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok())))
        .map(Amount::from_f64)
        .ok_or_else(|| MarketCoreError::MalformedMessage(format!("missing or non-numeric \"{field}\" field")))
}

fn int_field(value: &Value, field: &str) -> Result<i64, MarketCoreError> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| MarketCoreError::MalformedMessage(format!("missing or non-integer \"{field}\" field")))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn side_field(value: &Value, field: &str) -> Result<Side, MarketCoreError> {
    let raw = string_field(value, field).ok_or_else(|| MarketCoreError::MalformedMessage(format!("missing \"{field}\" field")))?;
    parse_side(&raw).ok_or_else(|| MarketCoreError::MalformedMessage(format!("unrecognized side \"{raw}\"")))
}
