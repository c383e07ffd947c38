use crate::event::flags::EventFlags;
use crate::event::market::{impl_market_event, impl_time_series_event};
use crate::event::LastingEvent;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

macro_rules! impl_time_series_index_ops {
    ($ty:ident) => {
        impl $ty {
            /// Change the primary time key, preserving the sequence number encoded in
            /// the index.
            pub fn with_time(mut self, time: i64) -> Self {
                let sequence = crate::event::sequence_from_time_series_index(self.index);
                self.index = (time.div_euclid(1_000) << 32)
                    | (time.rem_euclid(1_000) << 22)
                    | i64::from(sequence);
                self
            }

            /// Change the sequence number encoded in the index. Fails when the
            /// sequence does not fit in 22 bits.
            pub fn set_sequence(
                &mut self,
                sequence: i32,
            ) -> Result<(), crate::error::FeedError> {
                let time = crate::event::time_from_time_series_index(self.index);
                self.index = crate::event::compose_time_series_index(time, sequence)?;
                Ok(())
            }
        }
    };
}

pub(crate) use impl_time_series_index_ops;

/// Option greeks and implied volatility for an option symbol. Lasting per symbol and
/// also available as a time series of recomputations.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Greeks {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed timestamp and sequence.
    pub index: i64,
    /// Option market price.
    pub price: f64,
    /// Black-Scholes implied volatility.
    pub volatility: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub rho: f64,
    pub vega: f64,
}

impl Greeks {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(Greeks, Greeks);
impl_time_series_event!(Greeks);
impl_time_series_index_ops!(Greeks);

impl LastingEvent for Greeks {}

/// Theoretical option price and its model inputs. Lasting and time-series.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TheoPrice {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed timestamp and sequence.
    pub index: i64,
    /// Theoretical price.
    pub price: f64,
    /// Underlying price the theoretical price is based on.
    pub underlying_price: f64,
    pub delta: f64,
    pub gamma: f64,
    /// Implied simple dividend return of the underlying.
    pub dividend: f64,
    /// Implied simple interest return of the underlying.
    pub interest: f64,
}

impl TheoPrice {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(TheoPrice, TheoPrice);
impl_time_series_event!(TheoPrice);
impl_time_series_index_ops!(TheoPrice);

impl LastingEvent for TheoPrice {}

/// Implied-volatility snapshot of an underlying. Lasting and time-series.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Underlying {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Time-series index: packed timestamp and sequence.
    pub index: i64,
    /// 30-day implied volatility.
    pub volatility: f64,
    /// Front-month implied volatility.
    pub front_volatility: f64,
    /// Back-month implied volatility.
    pub back_volatility: f64,
    pub call_volume: f64,
    pub put_volume: f64,
    pub put_call_ratio: f64,
}

impl Underlying {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl_market_event!(Underlying, Underlying);
impl_time_series_event!(Underlying);
impl_time_series_index_ops!(Underlying);

impl LastingEvent for Underlying {}
