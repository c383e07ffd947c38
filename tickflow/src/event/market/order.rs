use crate::error::FeedError;
use crate::event::flags::EventFlags;
use crate::event::market::{IcebergType, OrderAction, OtcMarketsPriceType, Scope, Side};
use crate::event::source::{EventSource, OrderSource};
use crate::event::{format_time, IndexedEvent, TypedEvent};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{self, Display, Formatter};

/// Mask of the per-source portion of an order index. The high 32 bits carry the source
/// identifier.
const INDEX_MASK: i64 = 0xFFFF_FFFF;

/// Fields shared by every order-family event.
///
/// The `index` is unique per (symbol, source); its high 32 bits encode the source
/// identifier, so changing the source rewrites those bits and changing the index
/// implicitly re-derives the source.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct OrderBase {
    pub symbol: SmolStr,
    /// Event creation time, ms since epoch.
    pub event_time: i64,
    /// Transactional event flags.
    pub event_flags: EventFlags,
    /// Unique per-symbol-and-source index; high 32 bits are the source identifier.
    pub index: i64,
    /// Time of this order, ms since epoch.
    pub time: i64,
    /// Microseconds and nanoseconds part of the order time.
    pub time_nano_part: i32,
    /// Sequence number distinguishing orders with the same time.
    pub sequence: i32,
    /// Business meaning of this event, on full-order-book feeds.
    pub action: OrderAction,
    /// Time of the last action, ms since epoch.
    pub action_time: i64,
    /// Order identifier, on full-order-book feeds.
    pub order_id: i64,
    /// Auxiliary order identifier, on full-order-book feeds.
    pub aux_order_id: i64,
    pub price: f64,
    /// Size of this order. Zero or NaN signals removal of the entry at this index.
    pub size: f64,
    pub executed_size: f64,
    /// Number of individual orders in this aggregate.
    pub count: i64,
    /// Trade (order execution) identifier, on full-order-book feeds.
    pub trade_id: i64,
    pub trade_price: f64,
    pub trade_size: f64,
    pub exchange_code: i16,
    pub side: Side,
    pub scope: Scope,
}

impl OrderBase {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Source of this order, decoded from the high bits of the index.
    pub fn source(&self) -> OrderSource {
        OrderSource::from_id((self.index >> 32) as i32)
    }

    /// Change the source of this order by rewriting the high bits of the index.
    pub fn set_source(&mut self, source: &OrderSource) {
        self.index = (i64::from(source.id()) << 32) | (self.index & INDEX_MASK);
    }

    /// Change the index of this order. The source becomes whatever the high bits of
    /// the new index encode; call [`OrderBase::set_source`] afterwards to keep it.
    pub fn set_index(&mut self, index: i64) {
        self.index = index;
    }

    /// Whether this order carries a size, ie/ it is not a removal marker.
    pub fn has_size(&self) -> bool {
        self.size != 0.0 && !self.size.is_nan()
    }

    /// Time and sequence packed into a single comparable key.
    pub fn time_sequence(&self) -> i64 {
        (self.time.div_euclid(1_000) << 32)
            | (self.time.rem_euclid(1_000) << 22)
            | i64::from(self.sequence)
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

/// Behavior required of order-family events by the market-depth book: price/size,
/// side routing, and the tie-break inputs of the per-side comparator.
pub trait OrderEvent:
    IndexedEvent + TypedEvent + Clone + Send + Sync + 'static
{
    fn price(&self) -> f64;

    fn size(&self) -> f64;

    fn order_side(&self) -> Side;

    fn scope(&self) -> Scope;

    fn exchange_code(&self) -> i16;

    /// Time and sequence packed into a single comparable key.
    fn time_sequence(&self) -> i64;

    /// Market maker or other aggregate identifier, for subtypes that carry one.
    fn market_maker(&self) -> Option<&str> {
        None
    }

    /// Whether this event carries a size; `size == 0` or `size == NaN` is the removal
    /// marker for its index.
    fn has_size(&self) -> bool {
        self.size() != 0.0 && !self.size().is_nan()
    }
}

/// Implement the event traits for an order-family type, delegating to its
/// [`OrderBase`] reached through the given field path. The optional trailing path
/// names the market-maker field for subtypes that carry one.
macro_rules! impl_order_event {
    ($ty:ident, $kind:ident, $($base:ident).+) => {
        impl_order_event!(@common $ty, $kind, $($base).+);

        impl OrderEvent for $ty {
            impl_order_event!(@order_fns $($base).+);
        }
    };
    ($ty:ident, $kind:ident, $($base:ident).+, mm = $($mm:ident).+) => {
        impl_order_event!(@common $ty, $kind, $($base).+);

        impl OrderEvent for $ty {
            impl_order_event!(@order_fns $($base).+);

            fn market_maker(&self) -> Option<&str> {
                self.$($mm).+.as_deref()
            }
        }
    };
    (@common $ty:ident, $kind:ident, $($base:ident).+) => {
        impl crate::event::Event for $ty {
            fn event_time(&self) -> i64 {
                self.$($base).+.event_time
            }

            fn set_event_time(&mut self, event_time: i64) {
                self.$($base).+.event_time = event_time;
            }
        }

        impl crate::event::MarketEvent for $ty {
            fn symbol(&self) -> &SmolStr {
                &self.$($base).+.symbol
            }
        }

        impl TypedEvent for $ty {
            const KIND: crate::event::EventKind = crate::event::EventKind::$kind;
        }

        impl IndexedEvent for $ty {
            fn source(&self) -> EventSource {
                EventSource::Order(self.$($base).+.source())
            }

            fn event_flags(&self) -> EventFlags {
                self.$($base).+.event_flags
            }

            fn set_event_flags(&mut self, flags: EventFlags) {
                self.$($base).+.event_flags = flags;
            }

            fn index(&self) -> i64 {
                self.$($base).+.index
            }
        }
    };
    (@order_fns $($base:ident).+) => {
        fn price(&self) -> f64 {
            self.$($base).+.price
        }

        fn size(&self) -> f64 {
            self.$($base).+.size
        }

        fn order_side(&self) -> Side {
            self.$($base).+.side
        }

        fn scope(&self) -> Scope {
            self.$($base).+.scope
        }

        fn exchange_code(&self) -> i16 {
            self.$($base).+.exchange_code
        }

        fn time_sequence(&self) -> i64 {
            self.$($base).+.time_sequence()
        }
    };
}

/// An order on the market: one entry of the full available depth for a symbol.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Order {
    #[serde(flatten)]
    pub base: OrderBase,
    /// Market maker or other aggregate identifier. Defined for aggregate and
    /// individual scopes.
    pub market_maker: Option<SmolStr>,
}

impl Order {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            base: OrderBase::new(symbol),
            market_maker: None,
        }
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.base.set_index(index);
        self
    }

    pub fn with_source(mut self, source: &OrderSource) -> Self {
        self.base.set_source(source);
        self
    }

    pub fn with_event_flags(mut self, flags: EventFlags) -> Self {
        self.base.event_flags = flags;
        self
    }

    pub fn with_order_side(mut self, side: Side) -> Self {
        self.base.side = side;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.base.scope = scope;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.base.price = price;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.base.size = size;
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.base.time = time;
        self
    }

    pub fn with_exchange_code(mut self, exchange_code: i16) -> Self {
        self.base.exchange_code = exchange_code;
        self
    }

    pub fn with_market_maker(mut self, market_maker: impl Into<SmolStr>) -> Self {
        self.market_maker = Some(market_maker.into());
        self
    }
}

impl_order_event!(Order, Order, base, mm = market_maker);

impl Display for Order {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order{{{}, source={}, index={:#x}, time={}, side={}, scope={}, price={}, size={}}}",
            self.base.symbol,
            self.base.source(),
            self.base.index,
            format_time(self.base.time),
            self.base.side,
            self.base.scope,
            self.base.price,
            self.base.size,
        )
    }
}

/// An order with additional analytic information, eg/ iceberg disclosure fields.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct AnalyticOrder {
    #[serde(flatten)]
    pub order: Order,
    /// Iceberg peak size of this analytic order.
    pub iceberg_peak_size: f64,
    /// Iceberg hidden size of this analytic order.
    pub iceberg_hidden_size: f64,
    /// Iceberg executed size of this analytic order.
    pub iceberg_executed_size: f64,
    pub iceberg_type: IcebergType,
}

impl AnalyticOrder {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            order: Order::new(symbol),
            ..Default::default()
        }
    }
}

impl_order_event!(AnalyticOrder, AnalyticOrder, order.base, mm = order.market_maker);

/// An order on the OTC Markets venue, carrying OTC-specific quote condition fields.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct OtcMarketsOrder {
    #[serde(flatten)]
    pub order: Order,
    /// Quote Access Payment (QAP) value.
    pub quote_access_payment: i32,
    /// Whether this quote is open (displayed vs unpriced).
    pub open: bool,
    /// Whether this quote is unsolicited.
    pub unsolicited: bool,
    pub price_type: OtcMarketsPriceType,
    /// Whether this quote is saturated by the tier limit.
    pub saturated: bool,
    /// Whether this quote is in autoExecution mode.
    pub auto_execution: bool,
    /// Whether this quote represents an NMS conditional order.
    pub nms_conditional: bool,
}

impl OtcMarketsOrder {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            order: Order::new(symbol),
            ..Default::default()
        }
    }
}

impl_order_event!(OtcMarketsOrder, OtcMarketsOrder, order.base, mm = order.market_maker);

/// An order for a multi-leg spread instrument.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct SpreadOrder {
    #[serde(flatten)]
    pub base: OrderBase,
    /// Symbol of the spread this order belongs to.
    pub spread_symbol: SmolStr,
}

impl SpreadOrder {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            base: OrderBase::new(symbol),
            spread_symbol: SmolStr::default(),
        }
    }
}

impl_order_event!(SpreadOrder, SpreadOrder, base);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_high_bits_are_the_source() {
        let ntv = OrderSource::ntv();

        let order = Order::new("AAPL").with_index(7).with_source(&ntv);
        assert_eq!(order.base.source(), ntv);
        assert_eq!(order.base.index & INDEX_MASK, 7);

        // Setting the index afterwards overwrites the encoded source.
        let order = order.with_index(7);
        assert_eq!(order.base.source(), OrderSource::default_source());
    }

    #[test]
    fn test_has_size() {
        struct TestCase {
            size: f64,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: positive size
                size: 5.0,
                expected: true,
            },
            TestCase {
                // TC1: zero is the removal marker
                size: 0.0,
                expected: false,
            },
            TestCase {
                // TC2: NaN is the removal marker
                size: f64::NAN,
                expected: false,
            },
            TestCase {
                // TC3: negative sizes still count as a size
                size: -1.0,
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let order = Order::new("AAPL").with_size(test.size);
            assert_eq!(order.base.has_size(), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_time_sequence_ordering() {
        let earlier = Order::new("AAPL").with_time(1_000);
        let mut later = Order::new("AAPL").with_time(1_000);
        later.base.set_sequence(1).unwrap();

        assert!(OrderEvent::time_sequence(&earlier) < OrderEvent::time_sequence(&later));

        let much_later = Order::new("AAPL").with_time(2_000);
        assert!(OrderEvent::time_sequence(&later) < OrderEvent::time_sequence(&much_later));
    }

    #[test]
    fn test_set_sequence_rejects_out_of_range() {
        let mut order = Order::new("AAPL");
        assert!(order.base.set_sequence(crate::event::MAX_SEQUENCE).is_ok());
        assert!(order.base.set_sequence(crate::event::MAX_SEQUENCE + 1).is_err());
    }

    #[test]
    fn test_market_maker_only_on_order_subtypes() {
        let order = Order::new("AAPL").with_market_maker("NSDQ");
        assert_eq!(order.market_maker(), Some("NSDQ"));

        let spread = SpreadOrder::new("AAPL");
        assert_eq!(OrderEvent::market_maker(&spread), None);
    }
}
