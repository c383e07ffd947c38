use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::event::{EventKind, FeedEvent};
use crate::registry::EntityRegistry;
use crate::subscription::{FeedSubscription, SubscriptionCore};
use std::sync::Arc;
use tracing::debug;

/// Shared state of a feed, held weakly by attached subscriptions.
pub(crate) struct FeedCore {
    config: FeedConfig,
    /// Strong references to attached subscriptions, keyed by dense registry ids. The
    /// inbound boundary routes by id rather than by captured references.
    subscriptions: EntityRegistry<SubscriptionCore>,
}

impl FeedCore {
    pub(crate) fn detach_core(&self, core: &Arc<SubscriptionCore>) {
        if self.subscriptions.unregister_entity(core) {
            core.clear_feed();
        }
    }
}

/// In-process feed gateway: routes published event batches to every attached
/// subscription whose (kinds x symbols) set matches.
///
/// This is the local-hub role of the feed surface. A remote transport binds to the
/// same contract: [`Feed::attach`] / [`Feed::detach`] plus an inbound delivery channel
/// that hands each subscription its decoded batch.
///
/// The feed holds strong references to subscriptions through its entity registry;
/// subscriptions hold weak back-references. Closing a subscription unregisters it,
/// breaking the cycle.
#[derive(Clone)]
pub struct Feed {
    core: Arc<FeedCore>,
}

impl Default for Feed {
    fn default() -> Self {
        Self::new(FeedConfig::default())
    }
}

impl Feed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            core: Arc::new(FeedCore {
                config,
                subscriptions: EntityRegistry::new(),
            }),
        }
    }

    pub(crate) fn core(&self) -> &Arc<FeedCore> {
        &self.core
    }

    /// Create a subscription for the given kinds and attach it to this feed.
    pub fn create_subscription(
        &self,
        kinds: impl IntoIterator<Item = EventKind>,
    ) -> Result<FeedSubscription, FeedError> {
        let subscription = FeedSubscription::create(kinds)?;
        self.attach(&subscription)?;
        Ok(subscription)
    }

    /// Attach a subscription. Idempotent: attaching twice to the same feed is a no-op.
    ///
    /// Fails with [`FeedError::IllegalState`] for a closed subscription, and with
    /// [`FeedError::InvalidArgument`] when the subscription contains the wildcard
    /// symbol but this feed has wildcard support disabled.
    pub fn attach(&self, subscription: &FeedSubscription) -> Result<(), FeedError> {
        if subscription.is_closed() {
            return Err(FeedError::illegal_state(
                "cannot attach a closed subscription",
            ));
        }

        if subscription.core().has_wildcard() && !self.core.config.wildcard_enable {
            return Err(FeedError::invalid_argument(
                "wildcard subscriptions are disabled on this feed",
            ));
        }

        let id = self.core.subscriptions.register(subscription.core());
        subscription.core().set_feed(&self.core);
        debug!(subscription_id = id.value(), "attached subscription");

        Ok(())
    }

    /// Detach a subscription, removing all of its symbols from this feed's routing.
    /// Detaching a subscription that is not attached is a no-op.
    pub fn detach(&self, subscription: &FeedSubscription) -> Result<(), FeedError> {
        self.core.detach_core(subscription.core());
        Ok(())
    }

    /// Number of currently attached subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.core.subscriptions.len()
    }

    /// Publish a batch of events, delivering to every attached subscription whose
    /// kind and symbol sets match. Relative event order is preserved per
    /// subscription; delivery happens synchronously on the calling thread.
    pub fn publish(&self, events: impl IntoIterator<Item = FeedEvent>) {
        let events = events.into_iter().collect::<Vec<_>>();
        if events.is_empty() {
            return;
        }

        let wildcard_enabled = self.core.config.wildcard_enable;

        for subscription in self.core.subscriptions.snapshot() {
            let batch = events
                .iter()
                .filter(|event| subscription.matches_event(event, wildcard_enabled))
                .cloned()
                .collect::<Vec<_>>();

            if !batch.is_empty() {
                subscription.process_batch(batch);
            }
        }
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("config", &self.core.config)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Order, Quote, Trade};
    use crate::symbol::Symbol;
    use parking_lot::Mutex;

    fn collecting_subscription(
        feed: &Feed,
        kinds: impl IntoIterator<Item = EventKind>,
    ) -> (FeedSubscription, Arc<Mutex<Vec<FeedEvent>>>) {
        let subscription = feed.create_subscription(kinds).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_in_listener = Arc::clone(&received);
        subscription.add_event_listener(move |events| {
            received_in_listener.lock().extend(events.to_vec());
        });
        (subscription, received)
    }

    #[test]
    fn test_publish_routes_by_kind_and_symbol() {
        let feed = Feed::default();
        let (subscription, received) = collecting_subscription(&feed, [EventKind::Quote]);
        subscription.add_symbols(["AAPL"]).unwrap();

        feed.publish([
            FeedEvent::from(Quote::new("AAPL")),
            FeedEvent::from(Quote::new("MSFT")),
            FeedEvent::from(Trade::new("AAPL")),
        ]);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].symbol(), "AAPL");
        assert_eq!(received[0].kind(), EventKind::Quote);
    }

    #[test]
    fn test_source_decorated_symbol_filters_orders() {
        let feed = Feed::default();
        let (subscription, received) = collecting_subscription(&feed, [EventKind::Order]);

        let ntv = crate::event::source::OrderSource::ntv();
        subscription
            .add_symbols([Symbol::indexed_by_source("AAPL", ntv.clone())])
            .unwrap();

        feed.publish([
            FeedEvent::from(Order::new("AAPL").with_index(1).with_source(&ntv)),
            FeedEvent::from(Order::new("AAPL").with_index(2)),
        ]);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].source_id(), Some(ntv.id()));
    }

    #[test]
    fn test_wildcard_requires_feed_support() {
        let feed = Feed::default();
        let subscription = FeedSubscription::create([EventKind::Quote]).unwrap();
        subscription.add_symbols([Symbol::Wildcard]).unwrap();

        assert!(matches!(
            feed.attach(&subscription),
            Err(FeedError::InvalidArgument(_))
        ));

        let wildcard_feed = Feed::new(FeedConfig {
            wildcard_enable: true,
        });
        wildcard_feed.attach(&subscription).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_in_listener = Arc::clone(&received);
        subscription.add_event_listener(move |events| {
            received_in_listener.lock().extend(events.to_vec());
        });

        wildcard_feed.publish([
            FeedEvent::from(Quote::new("AAPL")),
            FeedEvent::from(Quote::new("MSFT")),
        ]);
        assert_eq!(received.lock().len(), 2);
    }

    #[test]
    fn test_double_attach_is_noop() {
        let feed = Feed::default();
        let (subscription, received) = collecting_subscription(&feed, [EventKind::Quote]);
        subscription.add_symbols(["AAPL"]).unwrap();

        feed.attach(&subscription).unwrap();
        assert_eq!(feed.subscription_count(), 1);

        feed.publish([FeedEvent::from(Quote::new("AAPL"))]);
        assert_eq!(received.lock().len(), 1);
    }

    #[test]
    fn test_attach_closed_subscription_fails() {
        let feed = Feed::default();
        let subscription = FeedSubscription::create([EventKind::Quote]).unwrap();
        subscription.close();

        assert!(matches!(
            feed.attach(&subscription),
            Err(FeedError::IllegalState(_))
        ));
    }

    #[test]
    fn test_close_detaches_from_feed() {
        let feed = Feed::default();
        let (subscription, _received) = collecting_subscription(&feed, [EventKind::Quote]);

        assert_eq!(feed.subscription_count(), 1);
        subscription.close();
        assert_eq!(feed.subscription_count(), 0);
    }
}
