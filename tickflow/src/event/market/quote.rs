use crate::event::market::impl_market_event;
use crate::event::{format_time, LastingEvent};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{self, Display, Formatter};

/// Best bid and offer for a symbol. Lasting: the latest quote per symbol supersedes
/// every earlier one.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Sequence number distinguishing quotes with the same time.
    pub sequence: i32,
    /// Time of the last bid change, ms since epoch.
    pub bid_time: i64,
    /// Exchange code of the venue quoting the bid.
    pub bid_exchange_code: i16,
    pub bid_price: f64,
    pub bid_size: f64,
    /// Time of the last ask change, ms since epoch.
    pub ask_time: i64,
    /// Exchange code of the venue quoting the ask.
    pub ask_exchange_code: i16,
    pub ask_price: f64,
    pub ask_size: f64,
}

impl Quote {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Time of the last bid or ask change, whichever is later.
    pub fn time(&self) -> i64 {
        self.bid_time.max(self.ask_time)
    }

    pub fn with_bid(mut self, price: f64, size: f64) -> Self {
        self.bid_price = price;
        self.bid_size = size;
        self
    }

    pub fn with_ask(mut self, price: f64, size: f64) -> Self {
        self.ask_price = price;
        self.ask_size = size;
        self
    }
}

impl_market_event!(Quote, Quote);

impl LastingEvent for Quote {}

impl Display for Quote {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quote{{{}, time={}, bid={}x{}, ask={}x{}}}",
            self.symbol,
            format_time(self.time()),
            self.bid_price,
            self.bid_size,
            self.ask_price,
            self.ask_size,
        )
    }
}
