use crate::error::FeedError;
use crate::event::flags::EventFlags;
use crate::event::source::EventSource;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Transactional event flags and snapshot/transaction boundary rules.
pub mod flags;

/// Event source identifiers and the order-source capability registry.
pub mod source;

/// Concrete market event value types.
pub mod market;

pub use market::candle::Candle;
pub use market::greeks::{Greeks, TheoPrice, Underlying};
pub use market::order::{AnalyticOrder, OtcMarketsOrder, Order, SpreadOrder};
pub use market::profile::{Profile, Summary};
pub use market::quote::Quote;
pub use market::series::{OptionSale, Series};
pub use market::time_and_sale::TimeAndSale;
pub use market::trade::Trade;

/// Maximum valid sequence number of a time-series event (22 bits).
pub const MAX_SEQUENCE: i32 = (1 << 22) - 1;

const SECONDS_SHIFT: u32 = 32;
const MILLISECONDS_SHIFT: u32 = 22;
const MILLISECONDS_MASK: i64 = 0x3FF;

/// Pack a millisecond timestamp and a sequence number into a time-series event index.
///
/// Layout: `(seconds << 32) | (milliseconds << 22) | sequence`. The sequence must fit
/// in 22 bits. Negative (historical) timestamps use floor division so the decode below
/// reproduces them exactly.
pub fn compose_time_series_index(time: i64, sequence: i32) -> Result<i64, FeedError> {
    if !(0..=MAX_SEQUENCE).contains(&sequence) {
        return Err(FeedError::SequenceOutOfRange {
            sequence: i64::from(sequence),
            max: i64::from(MAX_SEQUENCE),
        });
    }

    let seconds = time.div_euclid(1_000);
    let milliseconds = time.rem_euclid(1_000);

    Ok((seconds << SECONDS_SHIFT)
        | (milliseconds << MILLISECONDS_SHIFT)
        | i64::from(sequence))
}

/// Decode the millisecond timestamp from a time-series event index.
///
/// The seconds shift is arithmetic, preserving the sign of historical negative
/// timestamps.
pub fn time_from_time_series_index(index: i64) -> i64 {
    (index >> SECONDS_SHIFT) * 1_000 + ((index >> MILLISECONDS_SHIFT) & MILLISECONDS_MASK)
}

/// Decode the sequence number from a time-series event index.
pub fn sequence_from_time_series_index(index: i64) -> i32 {
    (index & i64::from(MAX_SEQUENCE)) as i32
}

/// Render a millisecond timestamp for event `Display` impls.
pub(crate) fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|time| time.format("%Y%m%d-%H%M%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Tag identifying a concrete event type, with its category flags.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize, Display,
)]
pub enum EventKind {
    Quote,
    Trade,
    Summary,
    Profile,
    TheoPrice,
    Underlying,
    Greeks,
    Order,
    AnalyticOrder,
    OtcMarketsOrder,
    SpreadOrder,
    Series,
    TimeAndSale,
    OptionSale,
    Candle,
}

impl EventKind {
    /// Every kind, in tag-id order.
    pub const ALL: [EventKind; 15] = [
        EventKind::Quote,
        EventKind::Trade,
        EventKind::Summary,
        EventKind::Profile,
        EventKind::TheoPrice,
        EventKind::Underlying,
        EventKind::Greeks,
        EventKind::Order,
        EventKind::AnalyticOrder,
        EventKind::OtcMarketsOrder,
        EventKind::SpreadOrder,
        EventKind::Series,
        EventKind::TimeAndSale,
        EventKind::OptionSale,
        EventKind::Candle,
    ];

    /// Stable numeric identifier of this kind.
    pub fn id(&self) -> u32 {
        *self as u32
    }

    /// Whether events of this kind have latest-value-per-symbol semantics.
    pub fn is_lasting(&self) -> bool {
        matches!(
            self,
            EventKind::Quote
                | EventKind::Trade
                | EventKind::Summary
                | EventKind::Profile
                | EventKind::TheoPrice
                | EventKind::Underlying
                | EventKind::Greeks
        )
    }

    /// Whether events of this kind carry an index, flags and a source.
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            EventKind::TheoPrice
                | EventKind::Underlying
                | EventKind::Greeks
                | EventKind::Order
                | EventKind::AnalyticOrder
                | EventKind::OtcMarketsOrder
                | EventKind::SpreadOrder
                | EventKind::Series
                | EventKind::TimeAndSale
                | EventKind::OptionSale
                | EventKind::Candle
        )
    }

    /// Whether the index of this kind encodes a primary time key.
    pub fn is_time_series(&self) -> bool {
        matches!(
            self,
            EventKind::TheoPrice
                | EventKind::Underlying
                | EventKind::Greeks
                | EventKind::TimeAndSale
                | EventKind::OptionSale
                | EventKind::Candle
        )
    }

    /// Whether this kind belongs to the order family usable in a market-depth book.
    pub fn is_order(&self) -> bool {
        matches!(
            self,
            EventKind::Order
                | EventKind::AnalyticOrder
                | EventKind::OtcMarketsOrder
                | EventKind::SpreadOrder
        )
    }

    /// Resolve a kind by name.
    pub fn from_name(name: &str) -> Result<Self, FeedError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == name)
            .ok_or_else(|| FeedError::UnknownEventKind(name.to_string()))
    }
}

/// Core behavior of every event: a millisecond event-time stamp.
pub trait Event {
    /// Time this event was created, ms since epoch.
    fn event_time(&self) -> i64;

    fn set_event_time(&mut self, event_time: i64);
}

/// An event tied to a market symbol.
pub trait MarketEvent: Event {
    fn symbol(&self) -> &SmolStr;
}

/// Compile-time link from a concrete event type to its [`EventKind`] tag.
pub trait TypedEvent {
    const KIND: EventKind;
}

/// Marker for events with latest-value-per-symbol semantics.
pub trait LastingEvent: MarketEvent {}

/// An event identified by a 64-bit index, unique within its (symbol, source) pair.
pub trait IndexedEvent: MarketEvent {
    /// Source of this event.
    fn source(&self) -> EventSource;

    /// Transactional event flags.
    fn event_flags(&self) -> EventFlags;

    fn set_event_flags(&mut self, flags: EventFlags);

    /// Unique per-symbol-and-source index of this event.
    fn index(&self) -> i64;
}

/// An indexed event whose index encodes a timestamp and sequence number.
pub trait TimeSeriesEvent: IndexedEvent {
    /// Timestamp of this event, ms since epoch, decoded from the index.
    fn time(&self) -> i64 {
        time_from_time_series_index(self.index())
    }

    /// Sequence number distinguishing events with the same time.
    fn sequence(&self) -> i32 {
        sequence_from_time_series_index(self.index())
    }
}

/// Tagged union over every concrete event type, used between the feed gateway and
/// subscriptions.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, From)]
pub enum FeedEvent {
    Quote(Quote),
    Trade(Trade),
    Summary(Summary),
    Profile(Profile),
    TheoPrice(TheoPrice),
    Underlying(Underlying),
    Greeks(Greeks),
    Order(Order),
    AnalyticOrder(AnalyticOrder),
    OtcMarketsOrder(OtcMarketsOrder),
    SpreadOrder(SpreadOrder),
    Series(Series),
    TimeAndSale(TimeAndSale),
    OptionSale(OptionSale),
    Candle(Candle),
}

macro_rules! for_each_event {
    ($self:ident, $event:ident => $body:expr) => {
        match $self {
            FeedEvent::Quote($event) => $body,
            FeedEvent::Trade($event) => $body,
            FeedEvent::Summary($event) => $body,
            FeedEvent::Profile($event) => $body,
            FeedEvent::TheoPrice($event) => $body,
            FeedEvent::Underlying($event) => $body,
            FeedEvent::Greeks($event) => $body,
            FeedEvent::Order($event) => $body,
            FeedEvent::AnalyticOrder($event) => $body,
            FeedEvent::OtcMarketsOrder($event) => $body,
            FeedEvent::SpreadOrder($event) => $body,
            FeedEvent::Series($event) => $body,
            FeedEvent::TimeAndSale($event) => $body,
            FeedEvent::OptionSale($event) => $body,
            FeedEvent::Candle($event) => $body,
        }
    };
}

impl FeedEvent {
    /// The kind tag of the wrapped event.
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::Quote(_) => EventKind::Quote,
            FeedEvent::Trade(_) => EventKind::Trade,
            FeedEvent::Summary(_) => EventKind::Summary,
            FeedEvent::Profile(_) => EventKind::Profile,
            FeedEvent::TheoPrice(_) => EventKind::TheoPrice,
            FeedEvent::Underlying(_) => EventKind::Underlying,
            FeedEvent::Greeks(_) => EventKind::Greeks,
            FeedEvent::Order(_) => EventKind::Order,
            FeedEvent::AnalyticOrder(_) => EventKind::AnalyticOrder,
            FeedEvent::OtcMarketsOrder(_) => EventKind::OtcMarketsOrder,
            FeedEvent::SpreadOrder(_) => EventKind::SpreadOrder,
            FeedEvent::Series(_) => EventKind::Series,
            FeedEvent::TimeAndSale(_) => EventKind::TimeAndSale,
            FeedEvent::OptionSale(_) => EventKind::OptionSale,
            FeedEvent::Candle(_) => EventKind::Candle,
        }
    }

    /// Symbol of the wrapped event.
    pub fn symbol(&self) -> &SmolStr {
        for_each_event!(self, event => event.symbol())
    }

    /// Event-time of the wrapped event.
    pub fn event_time(&self) -> i64 {
        for_each_event!(self, event => event.event_time())
    }

    /// Source identifier, for indexed event families.
    pub fn source_id(&self) -> Option<i32> {
        match self {
            FeedEvent::TheoPrice(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::Underlying(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::Greeks(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::Order(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::AnalyticOrder(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::OtcMarketsOrder(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::SpreadOrder(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::Series(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::TimeAndSale(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::OptionSale(event) => Some(IndexedEvent::source(event).id()),
            FeedEvent::Candle(event) => Some(IndexedEvent::source(event).id()),
            _ => None,
        }
    }

    /// Primary time key, for time-series event families.
    pub fn time(&self) -> Option<i64> {
        match self {
            FeedEvent::TheoPrice(event) => Some(event.time()),
            FeedEvent::Underlying(event) => Some(event.time()),
            FeedEvent::Greeks(event) => Some(event.time()),
            FeedEvent::TimeAndSale(event) => Some(event.time()),
            FeedEvent::OptionSale(event) => Some(event.time()),
            FeedEvent::Candle(event) => Some(event.time()),
            _ => None,
        }
    }

    /// Transactional flags, for indexed event families.
    pub fn event_flags(&self) -> Option<EventFlags> {
        match self {
            FeedEvent::TheoPrice(event) => Some(event.event_flags()),
            FeedEvent::Underlying(event) => Some(event.event_flags()),
            FeedEvent::Greeks(event) => Some(event.event_flags()),
            FeedEvent::Order(event) => Some(event.event_flags()),
            FeedEvent::AnalyticOrder(event) => Some(event.event_flags()),
            FeedEvent::OtcMarketsOrder(event) => Some(event.event_flags()),
            FeedEvent::SpreadOrder(event) => Some(event.event_flags()),
            FeedEvent::Series(event) => Some(event.event_flags()),
            FeedEvent::TimeAndSale(event) => Some(event.event_flags()),
            FeedEvent::OptionSale(event) => Some(event.event_flags()),
            FeedEvent::Candle(event) => Some(event.event_flags()),
            _ => None,
        }
    }
}

macro_rules! impl_try_from_feed_event {
    ($($variant:ident => $ty:ty,)*) => {
        $(
            impl TryFrom<FeedEvent> for $ty {
                type Error = FeedEvent;

                fn try_from(value: FeedEvent) -> Result<Self, Self::Error> {
                    match value {
                        FeedEvent::$variant(event) => Ok(event),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_try_from_feed_event!(
    Quote => Quote,
    Trade => Trade,
    Summary => Summary,
    Profile => Profile,
    TheoPrice => TheoPrice,
    Underlying => Underlying,
    Greeks => Greeks,
    Order => Order,
    AnalyticOrder => AnalyticOrder,
    OtcMarketsOrder => OtcMarketsOrder,
    SpreadOrder => SpreadOrder,
    Series => Series,
    TimeAndSale => TimeAndSale,
    OptionSale => OptionSale,
    Candle => Candle,
);
