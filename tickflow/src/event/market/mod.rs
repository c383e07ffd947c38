use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Candle events and candle symbols.
pub mod candle;

/// Option analytics events: Greeks, TheoPrice, Underlying.
pub mod greeks;

/// The order event family and its market-depth trait.
pub mod order;

/// Instrument profile and daily summary events.
pub mod profile;

/// Best bid and offer events.
pub mod quote;

/// Series events and option sales.
pub mod series;

/// Tick-by-tick trade prints.
pub mod time_and_sale;

/// Last trade and daily volume events.
pub mod trade;

/// Side of an order or an aggressor side of a trade.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum Side {
    #[default]
    Undefined,
    Buy,
    Sell,
}

impl Side {
    /// Stable numeric code of this side.
    pub fn code(&self) -> u8 {
        match self {
            Side::Undefined => 0,
            Side::Buy => 1,
            Side::Sell => 2,
        }
    }
}

/// Granularity of an order event. Finer scopes supersede coarser ones when building a
/// consistent view of market depth, and individual (`Order`-scoped) entries sort after
/// aggregates within a price level.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum Scope {
    Composite,
    Regional,
    Aggregate,
    #[default]
    Order,
}

impl Scope {
    /// Stable numeric code of this scope.
    pub fn code(&self) -> u8 {
        match self {
            Scope::Composite => 0,
            Scope::Regional => 1,
            Scope::Aggregate => 2,
            Scope::Order => 3,
        }
    }
}

/// Business meaning of an order event on full-order-book feeds.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum OrderAction {
    #[default]
    Undefined,
    New,
    Replace,
    Modify,
    Delete,
    Partial,
    Execute,
    Trade,
    Bust,
}

/// Iceberg disclosure type of an analytic order.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum IcebergType {
    #[default]
    Undefined,
    Native,
    Synthetic,
}

/// Quote price type on OTC Markets.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum OtcMarketsPriceType {
    #[default]
    Unpriced,
    Actual,
    Wanted,
}

/// Type of a time-and-sale print.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
    Display,
)]
pub enum TimeAndSaleType {
    #[default]
    New,
    Correction,
    Cancel,
}

/// Implement [`Event`](crate::event::Event), [`MarketEvent`](crate::event::MarketEvent)
/// and [`TypedEvent`](crate::event::TypedEvent) for a value type with inline `symbol`
/// and `event_time` fields.
macro_rules! impl_market_event {
    ($ty:ident, $kind:ident) => {
        impl crate::event::Event for $ty {
            fn event_time(&self) -> i64 {
                self.event_time
            }

            fn set_event_time(&mut self, event_time: i64) {
                self.event_time = event_time;
            }
        }

        impl crate::event::MarketEvent for $ty {
            fn symbol(&self) -> &smol_str::SmolStr {
                &self.symbol
            }
        }

        impl crate::event::TypedEvent for $ty {
            const KIND: crate::event::EventKind = crate::event::EventKind::$kind;
        }
    };
}

/// Implement the indexed + time-series traits for a value type with inline `index` and
/// `event_flags` fields. Time-series events always belong to the default source.
macro_rules! impl_time_series_event {
    ($ty:ident) => {
        impl crate::event::IndexedEvent for $ty {
            fn source(&self) -> crate::event::source::EventSource {
                crate::event::source::EventSource::default_source()
            }

            fn event_flags(&self) -> crate::event::flags::EventFlags {
                self.event_flags
            }

            fn set_event_flags(&mut self, flags: crate::event::flags::EventFlags) {
                self.event_flags = flags;
            }

            fn index(&self) -> i64 {
                self.index
            }
        }

        impl crate::event::TimeSeriesEvent for $ty {}
    };
}

pub(crate) use impl_market_event;
pub(crate) use impl_time_series_event;
