use crate::event::market::impl_market_event;
use crate::event::LastingEvent;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Instrument description and trading status for a symbol. Lasting.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Instrument description.
    pub description: Option<String>,
    /// Reason for the current trading halt, when halted.
    pub status_reason: Option<String>,
    /// Start of the trading halt, ms since epoch.
    pub halt_start_time: i64,
    /// End of the trading halt, ms since epoch.
    pub halt_end_time: i64,
    /// Maximal (limit-up) allowed price.
    pub high_limit_price: f64,
    /// Minimal (limit-down) allowed price.
    pub low_limit_price: f64,
    /// Highest price over the last 52 weeks.
    pub high_52_week_price: f64,
    /// Lowest price over the last 52 weeks.
    pub low_52_week_price: f64,
    /// Shares outstanding.
    pub shares: f64,
    /// Free-float shares: shares outstanding available to ordinary investors.
    pub free_float: f64,
}

impl Profile {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(Profile, Profile);

impl LastingEvent for Profile {}

/// Open/high/low/close and open-interest summary of the current trading day. Lasting.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Summary {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Identifier of the current trading day.
    pub day_id: i32,
    pub day_open_price: f64,
    pub day_high_price: f64,
    pub day_low_price: f64,
    pub day_close_price: f64,
    /// Identifier of the previous trading day.
    pub prev_day_id: i32,
    pub prev_day_close_price: f64,
    pub prev_day_volume: f64,
    /// Open interest of the previous trading day, for derivative instruments.
    pub open_interest: i64,
}

impl Summary {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(Summary, Summary);

impl LastingEvent for Summary {}
