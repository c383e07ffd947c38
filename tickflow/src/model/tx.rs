use crate::error::FeedError;
use crate::event::flags::EventFlags;
use crate::event::source::EventSource;
use crate::event::{FeedEvent, IndexedEvent, TimeSeriesEvent, TypedEvent};
use crate::feed::Feed;
use crate::subscription::{FeedSubscription, UNSET_FROM_TIME};
use crate::symbol::Symbol;
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

/// Listener of a transactional model: `(source, events, is_snapshot)`.
pub type TxListener<E> = Arc<dyn Fn(&EventSource, &[E], bool) + Send + Sync>;

/// Bound satisfied by every event type a transactional model can run over.
pub trait TxEvent:
    IndexedEvent
    + TypedEvent
    + Clone
    + TryFrom<FeedEvent, Error = FeedEvent>
    + Into<FeedEvent>
    + Send
    + Sync
    + 'static
{
}

impl<T> TxEvent for T where
    T: IndexedEvent
        + TypedEvent
        + Clone
        + TryFrom<FeedEvent, Error = FeedEvent>
        + Into<FeedEvent>
        + Send
        + Sync
        + 'static
{
}

/// A completed unit emitted by the per-source state machine.
enum TxUnit<E> {
    Transaction(Vec<E>),
    Snapshot(Vec<E>),
}

/// Per-(symbol, source) transactional state machine.
///
/// Events buffer while `TX_PENDING` is set; a snapshot buffers from `SNAPSHOT_BEGIN`
/// until it closes (explicit `SNAPSHOT_END`, or the first non-pending event for legacy
/// feeds) and discards any partial transaction held before it.
struct TxProcessor<E> {
    buffer: Vec<E>,
    snapshot: Vec<E>,
    in_snapshot: bool,
}

impl<E> Default for TxProcessor<E> {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            snapshot: Vec::new(),
            in_snapshot: false,
        }
    }
}

impl<E: TxEvent> TxProcessor<E> {
    fn process(&mut self, event: E) -> Option<TxUnit<E>> {
        let flags = event.event_flags();

        if self.in_snapshot {
            self.snapshot.push(event);

            if flags.closes_snapshot() {
                self.in_snapshot = false;
                return Some(TxUnit::Snapshot(std::mem::take(&mut self.snapshot)));
            }

            return None;
        }

        if flags.contains(EventFlags::SNAPSHOT_BEGIN) {
            // A snapshot replaces all previously held state, including a partial
            // transaction that never completed.
            self.buffer.clear();
            self.snapshot.clear();
            self.snapshot.push(event);

            if flags.contains(EventFlags::SNAPSHOT_END) {
                return Some(TxUnit::Snapshot(std::mem::take(&mut self.snapshot)));
            }

            self.in_snapshot = true;
            return None;
        }

        self.buffer.push(event);

        if flags.completes_transaction() {
            return Some(TxUnit::Transaction(std::mem::take(&mut self.buffer)));
        }

        None
    }
}

struct TxCore<E: TxEvent> {
    listener: TxListener<E>,
    symbol: Symbol,
    source_filter: Mutex<FnvHashSet<EventSource>>,
    from_time: Mutex<Option<i64>>,
    batch_processing: bool,
    snapshot_processing: bool,
    processors: Mutex<FnvHashMap<i32, TxProcessor<E>>>,
    closed: AtomicBool,
    subscription: FeedSubscription,
}

impl<E: TxEvent> TxCore<E> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Subscription symbols for the current decoration state: one per source filter
    /// entry, or the bare (possibly time-series-decorated) symbol when subscribing to
    /// all sources.
    fn decorated_symbols(&self) -> Vec<Symbol> {
        let base = match *self.from_time.lock() {
            Some(from_time) => Symbol::time_series(self.symbol.clone(), from_time),
            None => self.symbol.clone(),
        };

        let sources = self.source_filter.lock();
        if sources.is_empty() {
            vec![base]
        } else {
            sources
                .iter()
                .map(|source| Symbol::indexed_by_source(base.clone(), source.clone()))
                .collect()
        }
    }

    fn handle_batch(&self, events: &[FeedEvent]) {
        if self.is_closed() {
            return;
        }

        let typed = events
            .iter()
            .filter_map(|event| {
                // Unsubscribe-side markers are not propagated to listeners.
                if event
                    .event_flags()
                    .is_some_and(|flags| flags.contains(EventFlags::REMOVE_SYMBOL))
                {
                    return None;
                }

                match E::try_from(event.clone()) {
                    Ok(typed) => Some(typed),
                    Err(_) => {
                        self.subscription.core().record_dropped_event();
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        let mut emissions = Vec::new();
        {
            let source_filter = self.source_filter.lock().clone();
            let mut processors = self.processors.lock();

            // Events are processed in consecutive per-source runs, preserving
            // transactional grouping within each source.
            for (source, run) in &typed.into_iter().chunk_by(|event| event.source()) {
                if !source_filter.is_empty() && !source_filter.contains(&source) {
                    continue;
                }

                let processor = processors.entry(source.id()).or_default();

                for event in run {
                    let Some(unit) = processor.process(event) else {
                        continue;
                    };

                    match unit {
                        TxUnit::Snapshot(events) => {
                            if self.snapshot_processing {
                                emissions.push((source.clone(), events, true));
                            } else {
                                emissions.extend(
                                    events
                                        .into_iter()
                                        .map(|event| (source.clone(), vec![event], true)),
                                );
                            }
                        }
                        TxUnit::Transaction(events) => {
                            if self.batch_processing {
                                emissions.push((source.clone(), events, false));
                            } else {
                                emissions.extend(
                                    events
                                        .into_iter()
                                        .map(|event| (source.clone(), vec![event], false)),
                                );
                            }
                        }
                    }
                }
            }
        }

        // Locks are released before user callbacks fire.
        for (source, events, is_snapshot) in emissions {
            let listener = &self.listener;
            if catch_unwind(AssertUnwindSafe(|| listener(&source, &events, is_snapshot)))
                .is_err()
            {
                error!(%source, "transaction listener panicked");
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.subscription.close();
        self.processors.lock().clear();
    }
}

fn build_core<E: TxEvent>(
    feed: Option<&Feed>,
    symbol: Option<Symbol>,
    listener: Option<TxListener<E>>,
    sources: Vec<EventSource>,
    batch_processing: bool,
    snapshot_processing: bool,
    from_time: Option<i64>,
) -> Result<Arc<TxCore<E>>, FeedError> {
    let symbol = symbol.ok_or_else(|| FeedError::invalid_argument("symbol is required"))?;
    let listener = listener.ok_or_else(|| FeedError::invalid_argument("listener is required"))?;

    let subscription = FeedSubscription::create([E::KIND])?;

    let core = Arc::new(TxCore {
        listener,
        symbol,
        source_filter: Mutex::new(sources.into_iter().collect()),
        from_time: Mutex::new(from_time),
        batch_processing,
        snapshot_processing,
        processors: Mutex::new(FnvHashMap::default()),
        closed: AtomicBool::new(false),
        subscription: subscription.clone(),
    });

    let weak: Weak<TxCore<E>> = Arc::downgrade(&core);
    subscription.add_event_listener(move |events| {
        if let Some(core) = weak.upgrade() {
            core.handle_batch(events);
        }
    });

    subscription.add_symbols(core.decorated_symbols())?;

    if let Some(feed) = feed {
        feed.attach(&subscription)?;
    }

    Ok(core)
}

/// Builder of an [`IndexedTxModel`].
pub struct IndexedTxModelBuilder<E: TxEvent> {
    feed: Option<Feed>,
    symbol: Option<Symbol>,
    sources: Vec<EventSource>,
    listener: Option<TxListener<E>>,
    batch_processing: bool,
    snapshot_processing: bool,
}

impl<E: TxEvent> Default for IndexedTxModelBuilder<E> {
    fn default() -> Self {
        Self {
            feed: None,
            symbol: None,
            sources: Vec::new(),
            listener: None,
            batch_processing: true,
            snapshot_processing: false,
        }
    }
}

impl<E: TxEvent> IndexedTxModelBuilder<E> {
    /// The feed to attach to on build.
    pub fn with_feed(mut self, feed: &Feed) -> Self {
        self.feed = Some(feed.clone());
        self
    }

    /// The single subscription symbol. Required.
    pub fn with_symbol(mut self, symbol: impl Into<Symbol>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Sources to subscribe to; unset means all sources.
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EventSource>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// The transaction listener. Required.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&EventSource, &[E], bool) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Emit only completed transactions (default true).
    pub fn with_batch_processing(mut self, batch_processing: bool) -> Self {
        self.batch_processing = batch_processing;
        self
    }

    /// Buffer an entire snapshot and emit it as one unit (default false).
    pub fn with_snapshot_processing(mut self, snapshot_processing: bool) -> Self {
        self.snapshot_processing = snapshot_processing;
        self
    }

    /// Build the model. Fails with [`FeedError::InvalidArgument`] when the symbol or
    /// listener is unset.
    pub fn build(self) -> Result<IndexedTxModel<E>, FeedError> {
        Ok(IndexedTxModel {
            core: build_core(
                self.feed.as_ref(),
                self.symbol,
                self.listener,
                self.sources,
                self.batch_processing,
                self.snapshot_processing,
                None,
            )?,
        })
    }
}

/// Transactional model over an indexed event stream for one symbol.
///
/// Groups inbound events into per-source transactions and snapshots and hands each
/// completed unit to the listener, optionally batched. Snapshot delivery implies the
/// receiver must discard previously held state for that source first.
pub struct IndexedTxModel<E: TxEvent> {
    core: Arc<TxCore<E>>,
}

impl<E: TxEvent> IndexedTxModel<E> {
    pub fn builder() -> IndexedTxModelBuilder<E> {
        IndexedTxModelBuilder::default()
    }

    pub fn is_batch_processing(&self) -> bool {
        self.core.batch_processing
    }

    pub fn is_snapshot_processing(&self) -> bool {
        self.core.snapshot_processing
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The active source filter; empty means all sources.
    pub fn sources(&self) -> Vec<EventSource> {
        self.core.source_filter.lock().iter().cloned().collect()
    }

    /// Replace the source filter and re-subscribe accordingly.
    pub fn set_sources<I, S>(&self, sources: I) -> Result<(), FeedError>
    where
        I: IntoIterator<Item = S>,
        S: Into<EventSource>,
    {
        self.ensure_open()?;

        *self.core.source_filter.lock() = sources.into_iter().map(Into::into).collect();
        self.core
            .subscription
            .set_symbols(self.core.decorated_symbols())
    }

    /// Attach the model's subscription to a feed.
    pub fn attach(&self, feed: &Feed) -> Result<(), FeedError> {
        self.ensure_open()?;
        feed.attach(&self.core.subscription)
    }

    /// Detach the model's subscription from a feed.
    pub fn detach(&self, feed: &Feed) -> Result<(), FeedError> {
        self.ensure_open()?;
        feed.detach(&self.core.subscription)
    }

    /// Close the model: releases the subscription and drops pending buffers without
    /// emission. Terminal and idempotent.
    pub fn close(&self) {
        self.core.close();
    }

    fn ensure_open(&self) -> Result<(), FeedError> {
        if self.is_closed() {
            return Err(FeedError::illegal_state("tx model is closed"));
        }
        Ok(())
    }
}

impl<E: TxEvent> std::fmt::Debug for IndexedTxModelBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedTxModelBuilder")
            .field("symbol", &self.symbol)
            .field("sources", &self.sources)
            .field("batch_processing", &self.batch_processing)
            .field("snapshot_processing", &self.snapshot_processing)
            .finish()
    }
}

impl<E: TxEvent> std::fmt::Debug for IndexedTxModel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedTxModel")
            .field("symbol", &self.core.symbol)
            .field("batch_processing", &self.core.batch_processing)
            .field("snapshot_processing", &self.core.snapshot_processing)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder of a [`TimeSeriesTxModel`].
pub struct TimeSeriesTxModelBuilder<E: TxEvent + TimeSeriesEvent> {
    inner: IndexedTxModelBuilder<E>,
    from_time: i64,
}

impl<E: TxEvent + TimeSeriesEvent> Default for TimeSeriesTxModelBuilder<E> {
    fn default() -> Self {
        Self {
            inner: IndexedTxModelBuilder::default(),
            from_time: UNSET_FROM_TIME,
        }
    }
}

impl<E: TxEvent + TimeSeriesEvent> TimeSeriesTxModelBuilder<E> {
    pub fn with_feed(mut self, feed: &Feed) -> Self {
        self.inner = self.inner.with_feed(feed);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<Symbol>) -> Self {
        self.inner = self.inner.with_symbol(symbol);
        self
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&EventSource, &[E], bool) + Send + Sync + 'static,
    {
        self.inner = self.inner.with_listener(listener);
        self
    }

    pub fn with_batch_processing(mut self, batch_processing: bool) -> Self {
        self.inner = self.inner.with_batch_processing(batch_processing);
        self
    }

    pub fn with_snapshot_processing(mut self, snapshot_processing: bool) -> Self {
        self.inner = self.inner.with_snapshot_processing(snapshot_processing);
        self
    }

    /// History cursor, ms since epoch. Defaults to unset: no events are delivered
    /// until a cursor is set.
    pub fn with_from_time(mut self, from_time: i64) -> Self {
        self.from_time = from_time;
        self
    }

    pub fn build(self) -> Result<TimeSeriesTxModel<E>, FeedError> {
        Ok(TimeSeriesTxModel {
            core: build_core(
                self.inner.feed.as_ref(),
                self.inner.symbol,
                self.inner.listener,
                self.inner.sources,
                self.inner.batch_processing,
                self.inner.snapshot_processing,
                Some(self.from_time),
            )?,
        })
    }
}

/// Transactional model over a time-series event stream for one symbol, with a
/// history cursor.
pub struct TimeSeriesTxModel<E: TxEvent + TimeSeriesEvent> {
    core: Arc<TxCore<E>>,
}

impl<E: TxEvent + TimeSeriesEvent> TimeSeriesTxModel<E> {
    pub fn builder() -> TimeSeriesTxModelBuilder<E> {
        TimeSeriesTxModelBuilder::default()
    }

    pub fn is_batch_processing(&self) -> bool {
        self.core.batch_processing
    }

    pub fn is_snapshot_processing(&self) -> bool {
        self.core.snapshot_processing
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The history cursor, or [`UNSET_FROM_TIME`].
    pub fn from_time(&self) -> i64 {
        self.core.from_time.lock().unwrap_or(UNSET_FROM_TIME)
    }

    /// Move the history cursor, re-subscribing the symbol from the new time.
    pub fn set_from_time(&self, from_time: i64) -> Result<(), FeedError> {
        if self.is_closed() {
            return Err(FeedError::illegal_state("tx model is closed"));
        }

        {
            let mut held = self.core.from_time.lock();
            if *held == Some(from_time) {
                return Ok(());
            }
            *held = Some(from_time);
        }

        self.core
            .subscription
            .set_symbols(self.core.decorated_symbols())
    }

    /// Close the model. Terminal and idempotent.
    pub fn close(&self) {
        self.core.close();
    }
}

impl<E: TxEvent + TimeSeriesEvent> std::fmt::Debug for TimeSeriesTxModelBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeriesTxModelBuilder")
            .field("inner", &self.inner)
            .field("from_time", &self.from_time)
            .finish()
    }
}

impl<E: TxEvent + TimeSeriesEvent> std::fmt::Debug for TimeSeriesTxModel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeriesTxModel")
            .field("symbol", &self.core.symbol)
            .field("from_time", &self.from_time())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::market::Side;
    use crate::event::source::OrderSource;
    use crate::event::Order;
    use parking_lot::Mutex as PlMutex;

    type Call = (EventSource, Vec<i64>, bool);

    fn order(index: i64, size: f64, flags: EventFlags) -> FeedEvent {
        FeedEvent::from(
            Order::new("AAPL")
                .with_index(index)
                .with_order_side(Side::Buy)
                .with_price(10.0)
                .with_size(size)
                .with_event_flags(flags),
        )
    }

    fn order_from(source: &OrderSource, index: i64, flags: EventFlags) -> FeedEvent {
        FeedEvent::from(
            Order::new("AAPL")
                .with_index(index)
                .with_source(source)
                .with_order_side(Side::Buy)
                .with_price(10.0)
                .with_size(1.0)
                .with_event_flags(flags),
        )
    }

    fn build_model(
        feed: &Feed,
        batch_processing: bool,
        snapshot_processing: bool,
    ) -> (IndexedTxModel<Order>, Arc<PlMutex<Vec<Call>>>) {
        let calls = Arc::new(PlMutex::new(Vec::new()));
        let calls_in_listener = Arc::clone(&calls);

        let model = IndexedTxModel::<Order>::builder()
            .with_feed(feed)
            .with_symbol("AAPL")
            .with_batch_processing(batch_processing)
            .with_snapshot_processing(snapshot_processing)
            .with_listener(move |source, events, is_snapshot| {
                calls_in_listener.lock().push((
                    source.clone(),
                    events.iter().map(|event| event.base.index).collect(),
                    is_snapshot,
                ));
            })
            .build()
            .unwrap();

        (model, calls)
    }

    #[test]
    fn test_build_requires_symbol_and_listener() {
        let result = IndexedTxModel::<Order>::builder()
            .with_symbol("AAPL")
            .build();
        assert!(matches!(result, Err(FeedError::InvalidArgument(_))));

        let result = IndexedTxModel::<Order>::builder()
            .with_listener(|_, _, _| {})
            .build();
        assert!(matches!(result, Err(FeedError::InvalidArgument(_))));
    }

    #[test]
    fn test_transaction_buffers_until_pending_clears() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, true, false);

        feed.publish([order(1, 1.0, EventFlags::TX_PENDING)]);
        assert!(calls.lock().is_empty());

        feed.publish([order(2, 1.0, EventFlags::TX_PENDING)]);
        feed.publish([order(3, 1.0, EventFlags::EMPTY)]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![1, 2, 3]);
        assert!(!calls[0].2);
    }

    #[test]
    fn test_snapshot_emitted_as_one_unit() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, true, true);

        feed.publish([
            order(3, 1.0, EventFlags::SNAPSHOT_BEGIN | EventFlags::TX_PENDING),
            order(2, 1.0, EventFlags::TX_PENDING),
            order(0, 0.0, EventFlags::SNAPSHOT_END | EventFlags::REMOVE_EVENT),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![3, 2, 0]);
        assert!(calls[0].2);
    }

    #[test]
    fn test_snapshot_without_snapshot_processing_is_per_event() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, true, false);

        feed.publish([
            order(2, 1.0, EventFlags::SNAPSHOT_BEGIN | EventFlags::TX_PENDING),
            order(0, 1.0, EventFlags::SNAPSHOT_END),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec![2]);
        assert!(calls[0].2);
        assert_eq!(calls[1].1, vec![0]);
        assert!(calls[1].2);
    }

    #[test]
    fn test_legacy_snapshot_closes_on_first_non_pending_event() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, true, true);

        feed.publish([
            order(2, 1.0, EventFlags::SNAPSHOT_BEGIN | EventFlags::TX_PENDING),
            order(1, 1.0, EventFlags::TX_PENDING),
            // Legacy feeds never send SNAPSHOT_END.
            order(0, 1.0, EventFlags::EMPTY),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![2, 1, 0]);
        assert!(calls[0].2);
    }

    #[test]
    fn test_snapshot_discards_pending_transaction() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, true, true);

        feed.publish([
            order(7, 1.0, EventFlags::TX_PENDING),
            order(1, 1.0, EventFlags::SNAPSHOT_BEGIN | EventFlags::SNAPSHOT_END),
            order(8, 1.0, EventFlags::EMPTY),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        // The pending index-7 event never surfaces.
        assert_eq!(calls[0].1, vec![1]);
        assert!(calls[0].2);
        assert_eq!(calls[1].1, vec![8]);
        assert!(!calls[1].2);
    }

    #[test]
    fn test_without_batch_processing_each_event_is_emitted() {
        let feed = Feed::default();
        let (_model, calls) = build_model(&feed, false, false);

        feed.publish([
            order(1, 1.0, EventFlags::TX_PENDING),
            order(2, 1.0, EventFlags::EMPTY),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec![1]);
        assert_eq!(calls[1].1, vec![2]);
    }

    #[test]
    fn test_source_filter_drops_foreign_sources() {
        let feed = Feed::default();
        let ntv = OrderSource::ntv();
        let ice = OrderSource::ice();

        let calls = Arc::new(PlMutex::new(Vec::<Call>::new()));
        let calls_in_listener = Arc::clone(&calls);

        let _model = IndexedTxModel::<Order>::builder()
            .with_feed(&feed)
            .with_symbol("AAPL")
            .with_sources([ntv.clone()])
            .with_listener(move |source, events, is_snapshot| {
                calls_in_listener.lock().push((
                    source.clone(),
                    events.iter().map(|event| event.base.index).collect(),
                    is_snapshot,
                ));
            })
            .build()
            .unwrap();

        feed.publish([
            order_from(&ntv, 1, EventFlags::EMPTY),
            order_from(&ice, 1, EventFlags::EMPTY),
        ]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, EventSource::from(ntv));
    }

    #[test]
    fn test_sources_are_partitioned_independently() {
        let feed = Feed::default();
        let ntv = OrderSource::ntv();
        let ice = OrderSource::ice();
        let (_model, calls) = build_model(&feed, true, false);

        // An open transaction on NTV does not block ICE's completed transaction.
        feed.publish([
            order_from(&ntv, 1, EventFlags::TX_PENDING),
            order_from(&ice, 2, EventFlags::EMPTY),
        ]);

        {
            let calls = calls.lock();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0, EventSource::from(ice));
        }

        feed.publish([order_from(&ntv, 3, EventFlags::EMPTY)]);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, EventSource::from(ntv.clone()));
        let indices: Vec<i64> = calls[1].1.clone();
        let base = i64::from(ntv.id()) << 32;
        assert_eq!(indices, vec![base | 1, base | 3]);
    }

    #[test]
    fn test_close_drops_pending_buffers() {
        let feed = Feed::default();
        let (model, calls) = build_model(&feed, true, false);

        feed.publish([order(1, 1.0, EventFlags::TX_PENDING)]);
        model.close();
        feed.publish([order(2, 1.0, EventFlags::EMPTY)]);

        assert!(calls.lock().is_empty());
        assert!(model.is_closed());
        assert!(matches!(
            model.attach(&feed),
            Err(FeedError::IllegalState(_))
        ));
    }
}
