use crate::error::FeedError;
use crate::event::flags::EventFlags;
use crate::event::source::EventSource;
use crate::event::{
    compose_time_series_index, format_time, Event, IndexedEvent, MarketEvent, TimeSeriesEvent,
    TypedEvent,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{self, Display, Formatter};

/// Symbol of a candle subscription: a base market symbol with aggregation attributes
/// appended in curly braces, eg/ `AAPL{=5m}`.
///
/// Equality and hashing are on the full string, so the same base symbol with different
/// attributes subscribes independently.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CandleSymbol(SmolStr);

impl CandleSymbol {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_smol_str(&self) -> &SmolStr {
        &self.0
    }

    /// The base market symbol, without aggregation attributes.
    pub fn base_symbol(&self) -> &str {
        match self.0.find('{') {
            Some(position) => &self.0[..position],
            None => &self.0,
        }
    }
}

impl From<&str> for CandleSymbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for CandleSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One aggregation period of prices and trade volume for a candle symbol.
/// Time-series: the index encodes the period start time.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Candle {
    pub symbol: CandleSymbol,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed period start time and sequence.
    pub index: i64,
    /// Number of trades aggregated into this candle.
    pub count: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Volume-weighted average price of the period.
    pub vwap: f64,
    /// Volume traded at the bid side.
    pub bid_volume: f64,
    /// Volume traded at the ask side.
    pub ask_volume: f64,
    /// Implied volatility during the period, for derivative instruments.
    pub imp_volatility: f64,
    /// Open interest during the period, for derivative instruments.
    pub open_interest: f64,
}

impl Candle {
    pub fn new(symbol: impl Into<CandleSymbol>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Change the period start time, preserving the sequence encoded in the index.
    pub fn with_time(mut self, time: i64) -> Self {
        let sequence = crate::event::sequence_from_time_series_index(self.index);
        self.index = (time.div_euclid(1_000) << 32)
            | (time.rem_euclid(1_000) << 22)
            | i64::from(sequence);
        self
    }

    /// Change the sequence number encoded in the index. Fails when the sequence does
    /// not fit in 22 bits.
    pub fn set_sequence(&mut self, sequence: i32) -> Result<(), FeedError> {
        let time = crate::event::time_from_time_series_index(self.index);
        self.index = compose_time_series_index(time, sequence)?;
        Ok(())
    }
}

impl Event for Candle {
    fn event_time(&self) -> i64 {
        self.event_time
    }

    fn set_event_time(&mut self, event_time: i64) {
        self.event_time = event_time;
    }
}

impl MarketEvent for Candle {
    fn symbol(&self) -> &SmolStr {
        self.symbol.as_smol_str()
    }
}

impl TypedEvent for Candle {
    const KIND: crate::event::EventKind = crate::event::EventKind::Candle;
}

impl IndexedEvent for Candle {
    fn source(&self) -> EventSource {
        EventSource::default_source()
    }

    fn event_flags(&self) -> EventFlags {
        self.event_flags
    }

    fn set_event_flags(&mut self, flags: EventFlags) {
        self.event_flags = flags;
    }

    fn index(&self) -> i64 {
        self.index
    }
}

impl TimeSeriesEvent for Candle {}

impl Display for Candle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Candle{{{}, time={}, o={}, h={}, l={}, c={}, v={}}}",
            self.symbol,
            format_time(self.time()),
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}
