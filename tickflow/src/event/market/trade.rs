use crate::event::market::{impl_market_event, Side};
use crate::event::LastingEvent;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Last trade price and day volume for a symbol. Lasting.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Trade {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Time of the last trade, ms since epoch.
    pub time: i64,
    /// Microseconds and nanoseconds part of the trade time.
    pub time_nano_part: i32,
    /// Sequence number distinguishing trades with the same time.
    pub sequence: i32,
    /// Exchange code of the venue where the last trade occurred.
    pub exchange_code: i16,
    pub price: f64,
    /// Change of the last trade price.
    pub change: f64,
    pub size: f64,
    /// Identifier of the current trading day.
    pub day_id: i32,
    /// Total volume traded during the day.
    pub day_volume: f64,
    /// Total turnover traded during the day.
    pub day_turnover: f64,
    /// Aggressor side of the last trade.
    pub tick_side: Side,
    /// Whether the last trade occurred in extended trading hours.
    pub extended_trading_hours: bool,
}

impl Trade {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}

impl_market_event!(Trade, Trade);

impl LastingEvent for Trade {}
