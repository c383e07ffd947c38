use crate::event::market::candle::CandleSymbol;
use crate::event::source::EventSource;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{self, Display, Formatter};

/// A subscription symbol in any of its forms.
///
/// The two decorating variants attach per-subscription state to a base symbol: a
/// history cursor for time-series subscriptions and a source filter for indexed
/// subscriptions. Equality and hashing are defined on the fully-qualified form, so the
/// same base symbol decorated differently subscribes independently.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Symbol {
    /// Plain market symbol, eg/ "AAPL".
    Plain(SmolStr),

    /// Candle symbol with aggregation attributes, eg/ "AAPL{=5m}".
    Candle(CandleSymbol),

    /// Matches every symbol the feed carries. Subscribing requires the feed to have
    /// wildcard support enabled.
    Wildcard,

    /// Time-series subscription for `inner`, delivering events with
    /// `time >= from_time` (ms since epoch).
    TimeSeries { inner: Box<Symbol>, from_time: i64 },

    /// Indexed subscription for `inner`, restricted to a single event source.
    IndexedBySource {
        inner: Box<Symbol>,
        source: EventSource,
    },
}

impl Symbol {
    /// Decorate a symbol with a time-series history cursor.
    pub fn time_series(inner: impl Into<Symbol>, from_time: i64) -> Self {
        Self::TimeSeries {
            inner: Box::new(inner.into()),
            from_time,
        }
    }

    /// Decorate a symbol with a source filter.
    pub fn indexed_by_source(inner: impl Into<Symbol>, source: impl Into<EventSource>) -> Self {
        Self::IndexedBySource {
            inner: Box::new(inner.into()),
            source: source.into(),
        }
    }

    /// The undecorated base symbol.
    pub fn base(&self) -> &Symbol {
        match self {
            Symbol::TimeSeries { inner, .. } => inner.base(),
            Symbol::IndexedBySource { inner, .. } => inner.base(),
            other => other,
        }
    }

    /// Whether this symbol is the wildcard (at any decoration depth).
    pub fn is_wildcard(&self) -> bool {
        matches!(self.base(), Symbol::Wildcard)
    }

    /// Whether an inbound event matches this symbol form.
    ///
    /// `event_source_id` and `event_time` are `None` for event families that do not
    /// carry a source or a time, in which case the respective filter does not apply.
    pub fn matches(
        &self,
        event_symbol: &str,
        event_source_id: Option<i32>,
        event_time: Option<i64>,
    ) -> bool {
        match self {
            Symbol::Plain(symbol) => symbol == event_symbol,
            Symbol::Candle(symbol) => symbol.as_str() == event_symbol,
            Symbol::Wildcard => true,
            Symbol::TimeSeries { inner, from_time } => {
                inner.matches(event_symbol, event_source_id, event_time)
                    && event_time.is_none_or(|time| time >= *from_time)
            }
            Symbol::IndexedBySource { inner, source } => {
                inner.matches(event_symbol, event_source_id, event_time)
                    && event_source_id.is_none_or(|id| id == source.id())
            }
        }
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::Plain(SmolStr::new(value))
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::Plain(SmolStr::new(value))
    }
}

impl From<SmolStr> for Symbol {
    fn from(value: SmolStr) -> Self {
        Self::Plain(value)
    }
}

impl From<CandleSymbol> for Symbol {
    fn from(value: CandleSymbol) -> Self {
        Self::Candle(value)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Plain(symbol) => write!(f, "{symbol}"),
            Symbol::Candle(symbol) => write!(f, "{symbol}"),
            Symbol::Wildcard => write!(f, "*"),
            Symbol::TimeSeries { inner, from_time } => {
                write!(f, "{inner}{{fromTime={from_time}}}")
            }
            Symbol::IndexedBySource { inner, source } => write!(f, "{inner}#{source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::source::OrderSource;

    #[test]
    fn test_decorated_symbols_are_distinct() {
        let plain = Symbol::from("AAPL");
        let by_time = Symbol::time_series("AAPL", 1_700_000_000_000);
        let by_source = Symbol::indexed_by_source("AAPL", OrderSource::ntv());

        assert_ne!(plain, by_time);
        assert_ne!(plain, by_source);
        assert_ne!(by_time, by_source);
        assert_eq!(by_time.base(), &plain);
        assert_eq!(by_source.base(), &plain);
    }

    #[test]
    fn test_matches() {
        struct TestCase {
            symbol: Symbol,
            event_symbol: &'static str,
            event_source_id: Option<i32>,
            event_time: Option<i64>,
            expected: bool,
        }

        let ntv_id = OrderSource::ntv().id();

        let tests = vec![
            TestCase {
                // TC0: plain symbol matches on exact name
                symbol: Symbol::from("AAPL"),
                event_symbol: "AAPL",
                event_source_id: None,
                event_time: None,
                expected: true,
            },
            TestCase {
                // TC1: plain symbol rejects other names
                symbol: Symbol::from("AAPL"),
                event_symbol: "MSFT",
                event_source_id: None,
                event_time: None,
                expected: false,
            },
            TestCase {
                // TC2: wildcard matches everything
                symbol: Symbol::Wildcard,
                event_symbol: "MSFT",
                event_source_id: Some(ntv_id),
                event_time: None,
                expected: true,
            },
            TestCase {
                // TC3: source decoration filters foreign sources
                symbol: Symbol::indexed_by_source("AAPL", OrderSource::ntv()),
                event_symbol: "AAPL",
                event_source_id: Some(0),
                event_time: None,
                expected: false,
            },
            TestCase {
                // TC4: source decoration passes its own source
                symbol: Symbol::indexed_by_source("AAPL", OrderSource::ntv()),
                event_symbol: "AAPL",
                event_source_id: Some(ntv_id),
                event_time: None,
                expected: true,
            },
            TestCase {
                // TC5: time-series decoration drops events before the cursor
                symbol: Symbol::time_series("AAPL", 1_000),
                event_symbol: "AAPL",
                event_source_id: None,
                event_time: Some(999),
                expected: false,
            },
            TestCase {
                // TC6: time-series decoration passes events at or after the cursor
                symbol: Symbol::time_series("AAPL", 1_000),
                event_symbol: "AAPL",
                event_source_id: None,
                event_time: Some(1_000),
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                test.symbol
                    .matches(test.event_symbol, test.event_source_id, test.event_time),
                test.expected,
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_display_renders_decorations() {
        assert_eq!(Symbol::from("AAPL").to_string(), "AAPL");
        assert_eq!(Symbol::Wildcard.to_string(), "*");
        assert_eq!(
            Symbol::time_series("AAPL", 42).to_string(),
            "AAPL{fromTime=42}"
        );
        assert_eq!(
            Symbol::indexed_by_source("AAPL", OrderSource::ntv()).to_string(),
            "AAPL#NTV"
        );
    }
}
