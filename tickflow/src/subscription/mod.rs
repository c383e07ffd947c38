use crate::error::FeedError;
use crate::event::{EventKind, FeedEvent};
use crate::feed::{Feed, FeedCore};
use crate::symbol::Symbol;
use crate::timer::Timer;
use fnv::{FnvHashMap, FnvHashSet};
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error};

/// Batch event listener of a subscription.
pub type EventListener = Arc<dyn Fn(&[FeedEvent]) + Send + Sync>;

/// Sentinel id returned by [`FeedSubscription::add_change_listener`] when the listener
/// table is full. Removing it is a no-op.
pub const FULL_CHANGE_LISTENER_ID: usize = usize::MAX;

/// `from_time` value meaning "no history cursor set": a time-series subscription with
/// an unset cursor delivers nothing until [`TimeSeriesFeedSubscription::set_from_time`]
/// is called.
pub const UNSET_FROM_TIME: i64 = i64::MAX;

/// Observer of subscription symbol-set changes.
pub trait SubscriptionChangeListener: Send + Sync {
    /// Called synchronously with the net set of symbols actually added.
    fn on_symbols_added(&self, symbols: &[Symbol]);

    /// Called synchronously with the net set of symbols actually removed.
    fn on_symbols_removed(&self, symbols: &[Symbol]);

    /// Called once when the subscription transitions to closed.
    fn on_subscription_closed(&self) {}
}

/// Pending events of an open aggregation window.
#[derive(Default)]
struct PendingBatch {
    items: Vec<FeedEvent>,
    /// Positions of pure-lasting events by (kind, symbol), for latest-value coalescing.
    lasting_positions: FnvHashMap<(EventKind, SmolStr), usize>,
    timer: Option<Arc<Timer>>,
}

impl PendingBatch {
    fn push(&mut self, event: FeedEvent) {
        let kind = event.kind();

        // Lasting events coalesce to the latest value within the window; indexed
        // events are preserved to keep transactional grouping intact.
        if kind.is_lasting() && !kind.is_indexed() {
            let key = (kind, event.symbol().clone());
            match self.lasting_positions.get(&key) {
                Some(&position) => self.items[position] = event,
                None => {
                    self.lasting_positions.insert(key, self.items.len());
                    self.items.push(event);
                }
            }
        } else {
            self.items.push(event);
        }
    }

    fn take_items(&mut self) -> Vec<FeedEvent> {
        self.lasting_positions.clear();
        self.timer = None;
        std::mem::take(&mut self.items)
    }
}

/// Shared state of a subscription, held strongly by the feed's entity registry and by
/// every [`FeedSubscription`] handle.
pub(crate) struct SubscriptionCore {
    weak_self: Weak<SubscriptionCore>,
    kinds: Vec<EventKind>,
    symbols: Mutex<FnvHashSet<Symbol>>,
    event_listeners: Mutex<Vec<(u64, EventListener)>>,
    next_event_listener_id: AtomicU64,
    change_listeners: Mutex<FnvHashMap<usize, Arc<dyn SubscriptionChangeListener>>>,
    last_change_listener_id: AtomicUsize,
    aggregation_period_ms: AtomicU64,
    events_batch_limit: AtomicUsize,
    closed: AtomicBool,
    feed: Mutex<Weak<FeedCore>>,
    pending: Mutex<PendingBatch>,
    /// Serializes listener invocation: delivery for a single subscription is
    /// single-file even when the feed and an aggregation timer race.
    delivery: Mutex<()>,
    dropped_events: AtomicU64,
}

impl SubscriptionCore {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn has_wildcard(&self) -> bool {
        self.symbols.lock().iter().any(Symbol::is_wildcard)
    }

    pub(crate) fn set_feed(&self, feed: &Arc<FeedCore>) {
        *self.feed.lock() = Arc::downgrade(feed);
    }

    pub(crate) fn clear_feed(&self) {
        *self.feed.lock() = Weak::new();
    }

    pub(crate) fn attached_feed(&self) -> Option<Arc<FeedCore>> {
        self.feed.lock().upgrade()
    }

    /// Whether an inbound event belongs to this subscription's (kinds x symbols) set.
    pub(crate) fn matches_event(&self, event: &FeedEvent, wildcard_enabled: bool) -> bool {
        if self.is_closed() || !self.kinds.contains(&event.kind()) {
            return false;
        }

        let event_symbol = event.symbol().clone();
        let source_id = event.source_id();
        let time = event.time();

        self.symbols.lock().iter().any(|symbol| {
            if symbol.is_wildcard() && !wildcard_enabled {
                return false;
            }
            symbol.matches(&event_symbol, source_id, time)
        })
    }

    /// Accept an inbound batch from the feed: deliver immediately, or roll it into the
    /// open aggregation window.
    pub(crate) fn process_batch(&self, events: Vec<FeedEvent>) {
        // The transport may still hand over a batch in flight after close.
        if self.is_closed() || events.is_empty() {
            return;
        }

        let period = Duration::from_millis(self.aggregation_period_ms.load(Ordering::Acquire));
        if period.is_zero() {
            self.deliver_now(&events);
            return;
        }

        let mut pending = self.pending.lock();
        for event in events {
            pending.push(event);
        }

        let timer_idle = pending
            .timer
            .as_ref()
            .is_none_or(|timer| !timer.is_running());

        if timer_idle {
            let weak = self.weak_self.clone();
            pending.timer = Some(Timer::run_once(
                move || {
                    if let Some(core) = weak.upgrade() {
                        core.flush_pending();
                    }
                },
                period,
            ));
        }
    }

    fn flush_pending(&self) {
        let items = self.pending.lock().take_items();
        if !items.is_empty() {
            self.deliver_now(&items);
        }
    }

    /// Deliver a batch to every event listener, split by the batch limit. Listener
    /// panics are logged and do not poison subsequent listeners or batches.
    fn deliver_now(&self, events: &[FeedEvent]) {
        let listeners = self.event_listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }

        let _delivery = self.delivery.lock();
        if self.is_closed() {
            return;
        }

        let limit = self.events_batch_limit.load(Ordering::Acquire);
        let chunk_size = if limit == 0 { events.len() } else { limit };

        for chunk in events.chunks(chunk_size.max(1)) {
            for (id, listener) in &listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(chunk))).is_err() {
                    error!(
                        listener_id = *id,
                        "event listener panicked; continuing delivery"
                    );
                }
            }
        }
    }

    /// Record an inbound event that could not be decoded or routed.
    pub(crate) fn record_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    fn notify_symbols_added(&self, symbols: &[Symbol]) {
        self.notify_change_listeners(|listener| listener.on_symbols_added(symbols));
    }

    fn notify_symbols_removed(&self, symbols: &[Symbol]) {
        self.notify_change_listeners(|listener| listener.on_symbols_removed(symbols));
    }

    fn notify_change_listeners(&self, notify: impl Fn(&Arc<dyn SubscriptionChangeListener>)) {
        let listeners = self
            .change_listeners
            .lock()
            .values()
            .cloned()
            .collect::<Vec<_>>();

        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| notify(listener))).is_err() {
                error!("subscription change listener panicked");
            }
        }
    }

    fn ensure_open(&self) -> Result<(), FeedError> {
        if self.is_closed() {
            return Err(FeedError::illegal_state("subscription is closed"));
        }
        Ok(())
    }
}

/// A typed, observable set of (event kinds x symbols) with batched event delivery.
///
/// Handles are cheap to clone and share one underlying subscription. A subscription is
/// created detached, bound to a [`Feed`] on [`FeedSubscription::attach`], and closed
/// terminally by [`FeedSubscription::close`].
#[derive(Clone)]
pub struct FeedSubscription {
    core: Arc<SubscriptionCore>,
}

impl FeedSubscription {
    /// Create a detached subscription for the given event kinds.
    ///
    /// Fails with [`FeedError::InvalidArgument`] when the kind set is empty.
    pub fn create(kinds: impl IntoIterator<Item = EventKind>) -> Result<Self, FeedError> {
        let mut deduplicated = Vec::new();
        for kind in kinds {
            if !deduplicated.contains(&kind) {
                deduplicated.push(kind);
            }
        }

        if deduplicated.is_empty() {
            return Err(FeedError::invalid_argument(
                "subscription requires at least one event kind",
            ));
        }

        Ok(Self {
            core: Arc::new_cyclic(|weak_self| SubscriptionCore {
                weak_self: weak_self.clone(),
                kinds: deduplicated,
                symbols: Mutex::new(FnvHashSet::default()),
                event_listeners: Mutex::new(Vec::new()),
                next_event_listener_id: AtomicU64::new(0),
                change_listeners: Mutex::new(FnvHashMap::default()),
                last_change_listener_id: AtomicUsize::new(0),
                aggregation_period_ms: AtomicU64::new(0),
                events_batch_limit: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                feed: Mutex::new(Weak::new()),
                pending: Mutex::new(PendingBatch::default()),
                delivery: Mutex::new(()),
                dropped_events: AtomicU64::new(0),
            }),
        })
    }

    pub(crate) fn core(&self) -> &Arc<SubscriptionCore> {
        &self.core
    }

    /// The ordered set of event kinds this subscription delivers.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.core.kinds.clone()
    }

    pub fn contains_kind(&self, kind: EventKind) -> bool {
        self.core.kinds.contains(&kind)
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Add symbols to the subscription. Fires change listeners with the net added set.
    pub fn add_symbols<I, S>(&self, symbols: I) -> Result<(), FeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.core.ensure_open()?;

        let added = {
            let mut held = self.core.symbols.lock();
            symbols
                .into_iter()
                .map(Into::into)
                .filter(|symbol| held.insert(symbol.clone()))
                .collect::<Vec<_>>()
        };

        if !added.is_empty() {
            self.core.notify_symbols_added(&added);
        }

        Ok(())
    }

    /// Remove symbols from the subscription. Fires change listeners with the net
    /// removed set.
    pub fn remove_symbols<I, S>(&self, symbols: I) -> Result<(), FeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.core.ensure_open()?;

        let removed = {
            let mut held = self.core.symbols.lock();
            symbols
                .into_iter()
                .map(Into::into)
                .filter(|symbol| held.remove(symbol))
                .collect::<Vec<_>>()
        };

        if !removed.is_empty() {
            self.core.notify_symbols_removed(&removed);
        }

        Ok(())
    }

    /// Replace the symbol set, firing change listeners with the net differences.
    pub fn set_symbols<I, S>(&self, symbols: I) -> Result<(), FeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.core.ensure_open()?;

        let target = symbols
            .into_iter()
            .map(Into::into)
            .collect::<FnvHashSet<_>>();

        let (added, removed) = {
            let mut held = self.core.symbols.lock();
            let removed = held
                .iter()
                .filter(|symbol| !target.contains(symbol))
                .cloned()
                .collect::<Vec<_>>();
            let added = target
                .iter()
                .filter(|symbol| !held.contains(symbol))
                .cloned()
                .collect::<Vec<_>>();
            *held = target;
            (added, removed)
        };

        if !removed.is_empty() {
            self.core.notify_symbols_removed(&removed);
        }
        if !added.is_empty() {
            self.core.notify_symbols_added(&added);
        }

        Ok(())
    }

    /// Remove every symbol.
    pub fn clear(&self) -> Result<(), FeedError> {
        self.core.ensure_open()?;

        let removed = {
            let mut held = self.core.symbols.lock();
            held.drain().collect::<Vec<_>>()
        };

        if !removed.is_empty() {
            self.core.notify_symbols_removed(&removed);
        }

        Ok(())
    }

    /// Subscribed symbols in their undecorated base form.
    pub fn get_symbols(&self) -> Vec<Symbol> {
        self.core
            .symbols
            .lock()
            .iter()
            .map(|symbol| symbol.base().clone())
            .collect()
    }

    /// Subscribed symbols in their full form, including time-series cursors and
    /// source filters.
    pub fn get_decorated_symbols(&self) -> Vec<Symbol> {
        self.core.symbols.lock().iter().cloned().collect()
    }

    /// Register a batch event listener, returning its monotonic id.
    pub fn add_event_listener<F>(&self, listener: F) -> u64
    where
        F: Fn(&[FeedEvent]) + Send + Sync + 'static,
    {
        let id = self.core.next_event_listener_id.fetch_add(1, Ordering::AcqRel);
        self.core
            .event_listeners
            .lock()
            .push((id, Arc::new(listener)));
        id
    }

    /// Unregister an event listener. Returns whether it was registered.
    pub fn remove_event_listener(&self, id: u64) -> bool {
        let mut listeners = self.core.event_listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Register a change listener, returning its id, or
    /// [`FULL_CHANGE_LISTENER_ID`] when the listener table is full.
    pub fn add_change_listener(&self, listener: Arc<dyn SubscriptionChangeListener>) -> usize {
        let mut listeners = self.core.change_listeners.lock();

        if self.core.last_change_listener_id.load(Ordering::Acquire)
            >= FULL_CHANGE_LISTENER_ID - 1
        {
            return FULL_CHANGE_LISTENER_ID;
        }

        let id = self
            .core
            .last_change_listener_id
            .fetch_add(1, Ordering::AcqRel)
            + 1;
        listeners.insert(id, listener);
        id
    }

    /// Unregister a change listener. The sentinel id is ignored.
    pub fn remove_change_listener(&self, id: usize) {
        if id == FULL_CHANGE_LISTENER_ID {
            return;
        }
        self.core.change_listeners.lock().remove(&id);
    }

    /// Minimum time between successive deliveries; zero delivers immediately.
    /// Takes effect for subsequent batches.
    pub fn set_aggregation_period(&self, period: Duration) {
        self.core
            .aggregation_period_ms
            .store(period.as_millis() as u64, Ordering::Release);
    }

    pub fn aggregation_period(&self) -> Duration {
        Duration::from_millis(self.core.aggregation_period_ms.load(Ordering::Acquire))
    }

    /// Maximum number of events handed to a listener in one call; zero disables
    /// splitting. Takes effect for subsequent batches.
    pub fn set_events_batch_limit(&self, limit: usize) {
        self.core.events_batch_limit.store(limit, Ordering::Release);
    }

    pub fn events_batch_limit(&self) -> usize {
        self.core.events_batch_limit.load(Ordering::Acquire)
    }

    /// Number of inbound events dropped because they could not be decoded or routed.
    pub fn dropped_events(&self) -> u64 {
        self.core.dropped_events.load(Ordering::Relaxed)
    }

    /// Attach to a feed. Both sides end up referencing each other; attaching twice to
    /// the same feed is a no-op. Fails when the subscription is closed.
    pub fn attach(&self, feed: &Feed) -> Result<(), FeedError> {
        feed.attach(self)
    }

    /// Detach from a feed, removing this subscription from its routing table.
    pub fn detach(&self, feed: &Feed) -> Result<(), FeedError> {
        feed.detach(self)
    }

    /// Close the subscription: terminal and idempotent. Detaches from the feed, fires
    /// `on_subscription_closed`, and releases listeners. Safe to call from inside a
    /// listener callback.
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("closing subscription");

        {
            let mut pending = self.core.pending.lock();
            if let Some(timer) = pending.timer.take() {
                timer.stop();
            }
            pending.take_items();
        }

        if let Some(feed) = self.core.attached_feed() {
            feed.detach_core(&self.core);
        }
        self.core.clear_feed();

        let listeners = {
            let mut held = self.core.change_listeners.lock();
            held.drain().map(|(_, listener)| listener).collect::<Vec<_>>()
        };
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_subscription_closed())).is_err() {
                error!("subscription change listener panicked on close");
            }
        }

        self.core.event_listeners.lock().clear();
        self.core.symbols.lock().clear();
    }
}

impl PartialEq for FeedSubscription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for FeedSubscription {}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("kinds", &self.core.kinds)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Time-series flavor of [`FeedSubscription`]: every symbol is decorated with the
/// subscription's history cursor, and changing the cursor re-subscribes all symbols
/// from the new time.
pub struct TimeSeriesFeedSubscription {
    base: FeedSubscription,
    from_time: AtomicI64,
}

impl TimeSeriesFeedSubscription {
    /// Create a detached time-series subscription. Every kind must be time-series.
    pub fn create(kinds: impl IntoIterator<Item = EventKind>) -> Result<Self, FeedError> {
        let kinds = kinds.into_iter().collect::<Vec<_>>();

        if let Some(kind) = kinds.iter().find(|kind| !kind.is_time_series()) {
            return Err(FeedError::invalid_argument(format!(
                "{kind} is not a time-series event kind"
            )));
        }

        Ok(Self {
            base: FeedSubscription::create(kinds)?,
            from_time: AtomicI64::new(UNSET_FROM_TIME),
        })
    }

    /// The history cursor, or [`UNSET_FROM_TIME`].
    pub fn from_time(&self) -> i64 {
        self.from_time.load(Ordering::Acquire)
    }

    /// Add symbols, decorated with the current history cursor.
    pub fn add_symbols<I, S>(&self, symbols: I) -> Result<(), FeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let from_time = self.from_time();
        self.base.add_symbols(
            symbols
                .into_iter()
                .map(|symbol| Symbol::time_series(symbol.into(), from_time)),
        )
    }

    /// Move the history cursor. Re-subscribes every symbol from the new time, firing
    /// the usual removed-then-added change notifications.
    pub fn set_from_time(&self, from_time: i64) -> Result<(), FeedError> {
        if self.from_time.swap(from_time, Ordering::AcqRel) == from_time {
            return Ok(());
        }

        let bases = self
            .base
            .get_decorated_symbols()
            .into_iter()
            .map(|symbol| symbol.base().clone())
            .collect::<Vec<_>>();

        self.base.set_symbols(
            bases
                .into_iter()
                .map(|symbol| Symbol::time_series(symbol, from_time)),
        )
    }

    /// The underlying subscription, for listener registration and lifecycle calls.
    pub fn subscription(&self) -> &FeedSubscription {
        &self.base
    }
}

impl std::ops::Deref for TimeSeriesFeedSubscription {
    type Target = FeedSubscription;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::fmt::Debug for TimeSeriesFeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeriesFeedSubscription")
            .field("base", &self.base)
            .field("from_time", &self.from_time())
            .finish()
    }
}
