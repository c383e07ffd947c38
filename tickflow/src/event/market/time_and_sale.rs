use crate::event::flags::EventFlags;
use crate::event::market::greeks::impl_time_series_index_ops;
use crate::event::market::{impl_market_event, impl_time_series_event, Side, TimeAndSaleType};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One trade print on the tape. Time-series: the index encodes the print time and a
/// sequence number, so corrections and cancellations address the original print.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TimeAndSale {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed timestamp and sequence.
    pub index: i64,
    /// Microseconds and nanoseconds part of the print time.
    pub time_nano_part: i32,
    /// Exchange code of the venue where the trade occurred.
    pub exchange_code: i16,
    pub price: f64,
    pub size: f64,
    /// Bid price at the time of the print.
    pub bid_price: f64,
    /// Ask price at the time of the print.
    pub ask_price: f64,
    /// Sale conditions as reported by the exchange.
    pub exchange_sale_conditions: Option<SmolStr>,
    /// Aggressor side of the trade.
    pub aggressor_side: Side,
    /// Whether the trade is a leg of a spread execution.
    pub spread_leg: bool,
    /// Whether the trade occurred in extended trading hours.
    pub extended_trading_hours: bool,
    /// Whether the print updates the consolidated last price.
    pub valid_tick: bool,
    pub kind: TimeAndSaleType,
    /// Buyer identifier, when disclosed by the venue.
    pub buyer: Option<SmolStr>,
    /// Seller identifier, when disclosed by the venue.
    pub seller: Option<SmolStr>,
}

impl TimeAndSale {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Whether this print is a new (non-correction, non-cancel) trade.
    pub fn is_new(&self) -> bool {
        self.kind == TimeAndSaleType::New
    }
}

impl_market_event!(TimeAndSale, TimeAndSale);
impl_time_series_event!(TimeAndSale);
impl_time_series_index_ops!(TimeAndSale);
