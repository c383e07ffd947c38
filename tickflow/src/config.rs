use crate::error::FeedError;
use crate::event::source::{EventSource, OrderSource};
use crate::subscription::FeedSubscription;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::num::NonZeroUsize;
use std::time::Duration;

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, FeedError> {
    serde_json::from_str(json).map_err(|error| FeedError::invalid_argument(error.to_string()))
}

/// Feed-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedConfig {
    /// Enables subscribing to the wildcard symbol. Disabled by default: wildcard
    /// subscriptions receive the full event firehose.
    pub wildcard_enable: bool,
}

impl FeedConfig {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        from_json(json)
    }
}

/// Delivery tuning of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionOptions {
    /// Aggregation period in milliseconds; 0 delivers immediately.
    pub aggregation_period: u64,
    /// Maximum events per listener call; 0 disables splitting.
    pub events_batch_limit: usize,
}

impl SubscriptionOptions {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        from_json(json)
    }

    pub fn apply_to(&self, subscription: &FeedSubscription) {
        subscription.set_aggregation_period(Duration::from_millis(self.aggregation_period));
        subscription.set_events_batch_limit(self.events_batch_limit);
    }
}

/// Configuration of a transactional event model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TxOptions {
    /// Emit only completed transactions when true; emit each event individually when
    /// false.
    pub batch_processing: bool,
    /// Buffer an entire snapshot and emit it as one unit when true.
    pub snapshot_processing: bool,
    /// History cursor for the time-series flavor, ms since epoch.
    pub from_time: Option<i64>,
    /// Source mnemonics to subscribe to; empty means all sources.
    pub sources: Vec<SmolStr>,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            batch_processing: true,
            snapshot_processing: false,
            from_time: None,
            sources: Vec::new(),
        }
    }
}

impl TxOptions {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        from_json(json)
    }

    /// Resolve the configured source mnemonics.
    pub fn resolved_sources(&self) -> Result<Vec<EventSource>, FeedError> {
        self.sources
            .iter()
            .map(|name| Ok(EventSource::Order(OrderSource::from_name(name)?)))
            .collect()
    }
}

/// Configuration of a market-depth model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthOptions {
    /// Maximum orders per side exposed to the listener; 0 means unbounded.
    pub depth_limit: usize,
    /// Aggregation period in milliseconds; 0 notifies immediately.
    pub aggregation_period: u64,
}

impl DepthOptions {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        from_json(json)
    }

    /// The depth limit as an option: `None` is unbounded.
    pub fn depth_limit(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.depth_limit)
    }

    pub fn aggregation_period(&self) -> Duration {
        Duration::from_millis(self.aggregation_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            SubscriptionOptions::default(),
            SubscriptionOptions {
                aggregation_period: 0,
                events_batch_limit: 0,
            }
        );

        let tx = TxOptions::default();
        assert!(tx.batch_processing);
        assert!(!tx.snapshot_processing);
        assert_eq!(tx.from_time, None);
        assert!(tx.sources.is_empty());

        let depth = DepthOptions::default();
        assert_eq!(depth.depth_limit(), None);
        assert_eq!(depth.aggregation_period(), Duration::ZERO);

        assert!(!FeedConfig::default().wildcard_enable);
    }

    #[test]
    fn test_from_json() {
        let options = TxOptions::from_json(
            r#"
            {
                "batchProcessing": false,
                "snapshotProcessing": true,
                "fromTime": 1701703226537,
                "sources": ["NTV", "DEX"]
            }
            "#,
        )
        .unwrap();

        assert!(!options.batch_processing);
        assert!(options.snapshot_processing);
        assert_eq!(options.from_time, Some(1_701_703_226_537));
        assert_eq!(options.resolved_sources().unwrap().len(), 2);

        let depth = DepthOptions::from_json(r#"{"depthLimit": 10, "aggregationPeriod": 1000}"#)
            .unwrap();
        assert_eq!(depth.depth_limit().map(NonZeroUsize::get), Some(10));
        assert_eq!(depth.aggregation_period(), Duration::from_millis(1000));
    }

    #[test]
    fn test_unknown_source_mnemonic_fails() {
        let options = TxOptions {
            sources: vec![SmolStr::new("TOOLONG")],
            ..TxOptions::default()
        };

        assert!(matches!(
            options.resolved_sources(),
            Err(FeedError::InvalidSourceMnemonic(_))
        ));
    }
}
