//! Configuration surface recognized by [`crate::api::Api`].
//!
//! Parsing an actual config file is out of scope; this is a plain struct
//! built by the embedder, not a file format this crate reads itself.

use crate::error::{MarketCoreError, Result};

/// Market and connection configuration, read once at [`crate::api::Api`]
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_currency: String,
    pub quote_currency: String,
    pub use_ssl: bool,
    pub use_plain_old_websocket: bool,
    pub use_http_api: bool,
    pub use_tonce: bool,
    pub load_fulldepth: bool,
    pub load_history: bool,
    /// Candle bucket width, in minutes.
    pub history_timeframe: u32,
    /// True if this session has no API secret configured, which relaxes
    /// the ready gate's `ready_info`/`ready_owns` requirements.
    pub has_secret: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_currency: "XETH".to_string(),
            quote_currency: "XXBT".to_string(),
            use_ssl: true,
            use_plain_old_websocket: false,
            use_http_api: true,
            use_tonce: true,
            load_fulldepth: true,
            load_history: true,
            history_timeframe: 15,
            has_secret: true,
        }
    }
}

impl Config {
    /// Candle bucket width in seconds, as [`crate::history::History`] wants it.
    pub fn history_timeframe_seconds(&self) -> i64 {
        i64::from(self.history_timeframe) * 60
    }

    /// Reject configurations that can never produce a usable engine.
    pub fn validate(&self) -> Result<()> {
        if self.base_currency.is_empty() || self.quote_currency.is_empty() {
            return Err(MarketCoreError::InvalidConfig(
                "base_currency and quote_currency must both be set".to_string(),
            ));
        }
        if self.history_timeframe == 0 {
            return Err(MarketCoreError::InvalidConfig(
                "history_timeframe must be a positive number of minutes".to_string(),
            ));
        }
        Ok(())
    }
}
