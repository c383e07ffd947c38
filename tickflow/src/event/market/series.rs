use crate::event::flags::EventFlags;
use crate::event::market::greeks::impl_time_series_index_ops;
use crate::event::market::{impl_market_event, impl_time_series_event, Side};
use crate::event::source::EventSource;
use crate::event::IndexedEvent;
use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Properties of a whole option series for an underlying: one entry per expiration.
/// Indexed: the collection of series events for a symbol represents the current set
/// of expirations.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Series {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Unique per-symbol index of this series.
    pub index: i64,
    /// Time of the last series update, ms since epoch.
    pub time: i64,
    /// Sequence number distinguishing updates with the same time.
    pub sequence: i32,
    /// Day id of the series expiration.
    pub expiration: i32,
    /// Implied volatility index of this series.
    pub volatility: f64,
    pub call_volume: f64,
    pub put_volume: f64,
    pub put_call_ratio: f64,
    /// Implied forward price of this series.
    pub forward_price: f64,
    /// Implied simple dividend return of this series.
    pub dividend: f64,
    /// Implied simple interest return of this series.
    pub interest: f64,
}

impl Series {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Change the sequence number. Fails when the sequence does not fit in 22 bits.
    pub fn set_sequence(&mut self, sequence: i32) -> Result<(), FeedError> {
        if !(0..=crate::event::MAX_SEQUENCE).contains(&sequence) {
            return Err(FeedError::SequenceOutOfRange {
                sequence: i64::from(sequence),
                max: i64::from(crate::event::MAX_SEQUENCE),
            });
        }

        self.sequence = sequence;
        Ok(())
    }
}

impl_market_event!(Series, Series);

impl IndexedEvent for Series {
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

/// A sale of an option contract together with the underlying conditions it printed
/// against. Time-series.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct OptionSale {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed timestamp and sequence.
    pub index: i64,
    pub price: f64,
    pub size: f64,
    /// Exchange code of the venue where the sale occurred.
    pub exchange_code: i16,
    /// Bid price at the time of the sale.
    pub bid_price: f64,
    /// Ask price at the time of the sale.
    pub ask_price: f64,
    /// Aggressor side of the sale.
    pub aggressor_side: Side,
    /// Underlying price at the time of the sale.
    pub underlying_price: f64,
    /// Black-Scholes implied volatility at the time of the sale.
    pub volatility: f64,
    pub delta: f64,
    /// Option symbol of the contract that traded.
    pub option_symbol: SmolStr,
}

impl OptionSale {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(OptionSale, OptionSale);
impl_time_series_event!(OptionSale);
impl_time_series_index_ops!(OptionSale);
