use crate::error::FeedError;
use crate::event::flags::EventFlags;
use crate::event::market::order::OrderEvent;
use crate::event::market::{Scope, Side};
use crate::event::source::EventSource;
use crate::event::IndexedEvent;
use crate::feed::Feed;
use crate::model::tx::{IndexedTxModel, TxEvent};
use crate::symbol::Symbol;
use crate::timer::Timer;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::error;

/// Listener of a market-depth model: `(buy_orders, sell_orders)`, each sorted and
/// truncated to the depth limit. The vectors are value snapshots; later book mutations
/// are not observable through them.
pub type DepthListener<O> = Arc<dyn Fn(&[Arc<O>], &[Arc<O>]) + Send + Sync>;

/// Stable tie-break within one side after price has been compared: non-individual
/// orders first (larger size, then earlier time), individual orders after (earlier
/// time first), with the unique index as the final key.
fn compare_orders<O: OrderEvent>(a: &O, b: &O) -> CmpOrdering {
    let a_individual = a.scope() == Scope::Order;
    let b_individual = b.scope() == Scope::Order;

    match (a_individual, b_individual) {
        (true, true) => a
            .time_sequence()
            .cmp(&b.time_sequence())
            .then_with(|| a.index().cmp(&b.index())),
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => b
            .size()
            .total_cmp(&a.size())
            .then_with(|| a.time_sequence().cmp(&b.time_sequence()))
            .then_with(|| a.scope().code().cmp(&b.scope().code()))
            .then_with(|| a.exchange_code().cmp(&b.exchange_code()))
            .then_with(|| a.market_maker().cmp(&b.market_maker()))
            .then_with(|| a.index().cmp(&b.index())),
    }
}

/// Total order of one book side.
pub(crate) trait SideRank<O>: Send + Sync + 'static {
    fn rank(a: &O, b: &O) -> CmpOrdering;
}

/// Buy side: descending by price.
pub(crate) struct BuyRank;

/// Sell side: ascending by price.
pub(crate) struct SellRank;

impl<O: OrderEvent> SideRank<O> for BuyRank {
    fn rank(a: &O, b: &O) -> CmpOrdering {
        b.price()
            .total_cmp(&a.price())
            .then_with(|| compare_orders(a, b))
    }
}

impl<O: OrderEvent> SideRank<O> for SellRank {
    fn rank(a: &O, b: &O) -> CmpOrdering {
        a.price()
            .total_cmp(&b.price())
            .then_with(|| compare_orders(a, b))
    }
}

/// An order keyed by its side comparator, for storage in a sorted set.
struct Ranked<O, R> {
    order: Arc<O>,
    rank: PhantomData<R>,
}

impl<O, R> Ranked<O, R> {
    fn new(order: Arc<O>) -> Self {
        Self {
            order,
            rank: PhantomData,
        }
    }
}

impl<O, R> Clone for Ranked<O, R> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.order))
    }
}

impl<O: OrderEvent, R: SideRank<O>> PartialEq for Ranked<O, R> {
    fn eq(&self, other: &Self) -> bool {
        R::rank(&self.order, &other.order) == CmpOrdering::Equal
    }
}

impl<O: OrderEvent, R: SideRank<O>> Eq for Ranked<O, R> {}

impl<O: OrderEvent, R: SideRank<O>> PartialOrd for Ranked<O, R> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<O: OrderEvent, R: SideRank<O>> Ord for Ranked<O, R> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        R::rank(&self.order, &other.order)
    }
}

/// One sorted side of the book, with a cached last-published snapshot and dirty
/// accounting that ignores churn beyond the visible depth window.
struct SortedOrderSet<O: OrderEvent, R: SideRank<O>> {
    orders: BTreeSet<Ranked<O, R>>,
    snapshot: Vec<Arc<O>>,
    depth_limit: Option<NonZeroUsize>,
    changed: bool,
}

impl<O: OrderEvent, R: SideRank<O>> SortedOrderSet<O, R> {
    fn new(depth_limit: Option<NonZeroUsize>) -> Self {
        Self {
            orders: BTreeSet::new(),
            snapshot: Vec::new(),
            depth_limit,
            changed: false,
        }
    }

    fn is_changed(&self) -> bool {
        self.changed
    }

    fn set_depth_limit(&mut self, depth_limit: Option<NonZeroUsize>) {
        if self.depth_limit == depth_limit {
            return;
        }

        self.depth_limit = depth_limit;
        self.changed = true;
    }

    fn is_order_count_within_depth_limit(&self) -> bool {
        match self.depth_limit {
            None => true,
            Some(limit) => self.orders.len() <= limit.get(),
        }
    }

    fn is_order_within_depth_limit(&self, order: &Arc<O>) -> bool {
        match self.snapshot.last() {
            None => true,
            Some(last) => R::rank(last, order) != CmpOrdering::Less,
        }
    }

    fn mark_changed_if_needed(&mut self, order: &Arc<O>) {
        if self.changed {
            return;
        }

        if self.depth_limit.is_none()
            || self.is_order_count_within_depth_limit()
            || self.is_order_within_depth_limit(order)
        {
            self.changed = true;
        }
    }

    fn insert(&mut self, order: Arc<O>) -> bool {
        if self.orders.insert(Ranked::new(Arc::clone(&order))) {
            self.mark_changed_if_needed(&order);
            return true;
        }

        false
    }

    fn remove(&mut self, order: &Arc<O>) -> bool {
        if self.orders.remove(&Ranked::<O, R>::new(Arc::clone(order))) {
            self.mark_changed_if_needed(order);
            return true;
        }

        false
    }

    fn clear_by_source(&mut self, source: &EventSource) {
        let size_before = self.orders.len();
        self.orders
            .retain(|ranked| IndexedEvent::source(&*ranked.order) != *source);
        self.changed = self.orders.len() != size_before;
    }

    fn update_snapshot(&mut self) {
        self.changed = false;
        self.snapshot.clear();

        let limit = self
            .depth_limit
            .map(NonZeroUsize::get)
            .unwrap_or(usize::MAX);

        self.snapshot.extend(
            self.orders
                .iter()
                .take(limit)
                .map(|ranked| Arc::clone(&ranked.order)),
        );
    }

    fn to_vec(&mut self) -> Vec<Arc<O>> {
        if self.changed {
            self.update_snapshot();
        }

        self.snapshot.clone()
    }
}

struct DepthState<O: OrderEvent> {
    orders_by_index: FnvHashMap<i64, Arc<O>>,
    buy_orders: SortedOrderSet<O, BuyRank>,
    sell_orders: SortedOrderSet<O, SellRank>,
    depth_limit: Option<NonZeroUsize>,
    aggregation_period: Duration,
}

struct DepthCore<O: OrderEvent + TxEvent> {
    weak_self: Weak<DepthCore<O>>,
    state: Mutex<DepthState<O>>,
    listener: DepthListener<O>,
    tx_model: OnceLock<IndexedTxModel<O>>,
    task_scheduled: AtomicBool,
    task_timer: Mutex<Option<Arc<Timer>>>,
    closed: AtomicBool,
}

fn shall_add<O: OrderEvent>(order: &O) -> bool {
    order.has_size() && !order.event_flags().contains(EventFlags::REMOVE_EVENT)
}

impl<O: OrderEvent + TxEvent> DepthCore<O> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn events_received(&self, source: &EventSource, events: &[O], is_snapshot: bool) {
        if self.is_closed() {
            return;
        }

        let (changed, aggregation_period) = {
            let mut state = self.state.lock();
            let changed = Self::update(&mut state, source, events, is_snapshot);
            (changed, state.aggregation_period)
        };

        if !changed {
            return;
        }

        if is_snapshot || aggregation_period.is_zero() {
            self.try_cancel_task();
            self.notify_listeners();
        } else {
            self.schedule_task_if_needed(aggregation_period);
        }
    }

    fn update(
        state: &mut DepthState<O>,
        source: &EventSource,
        events: &[O],
        is_snapshot: bool,
    ) -> bool {
        if is_snapshot {
            Self::clear_by_source(state, source);
        }

        for order in events {
            if let Some(existing) = state.orders_by_index.remove(&order.index()) {
                match existing.order_side() {
                    Side::Buy => state.buy_orders.remove(&existing),
                    _ => state.sell_orders.remove(&existing),
                };
            }

            if shall_add(order) {
                let order = Arc::new(order.clone());
                state
                    .orders_by_index
                    .insert(order.index(), Arc::clone(&order));

                match order.order_side() {
                    Side::Buy => state.buy_orders.insert(order),
                    _ => state.sell_orders.insert(order),
                };
            }
        }

        state.buy_orders.is_changed() || state.sell_orders.is_changed()
    }

    fn clear_by_source(state: &mut DepthState<O>, source: &EventSource) {
        state
            .orders_by_index
            .retain(|_, order| IndexedEvent::source(&**order) != *source);

        state.buy_orders.clear_by_source(source);
        state.sell_orders.clear_by_source(source);
    }

    /// Snapshot both sides and invoke the listener. State locks are released before
    /// the callback fires.
    fn notify_listeners(&self) {
        let (buy, sell) = {
            let mut state = self.state.lock();
            (state.buy_orders.to_vec(), state.sell_orders.to_vec())
        };

        self.task_scheduled.store(false, Ordering::Release);

        if self.is_closed() {
            return;
        }

        let listener = &self.listener;
        if catch_unwind(AssertUnwindSafe(|| listener(&buy, &sell))).is_err() {
            error!("market depth listener panicked");
        }
    }

    fn schedule_task_if_needed(&self, delay: Duration) {
        if !self.task_scheduled.swap(true, Ordering::AcqRel) {
            let weak = self.weak_self.clone();
            *self.task_timer.lock() = Some(Timer::run_once(
                move || {
                    if let Some(core) = weak.upgrade() {
                        core.notify_listeners();
                    }
                },
                delay,
            ));
        }
    }

    fn reschedule_task_if_needed(&self, delay: Duration) {
        if self.try_cancel_task() && !delay.is_zero() {
            self.schedule_task_if_needed(delay);
        }
    }

    fn try_cancel_task(&self) -> bool {
        if !self.task_scheduled.load(Ordering::Acquire) {
            return false;
        }

        let mut held = self.task_timer.lock();
        match held.as_ref() {
            Some(timer) if timer.is_running() => {
                timer.stop();
                *held = None;
                self.task_scheduled.store(false, Ordering::Release);
                true
            }
            _ => false,
        }
    }
}

/// Builder of a [`MarketDepthModel`].
pub struct MarketDepthModelBuilder<O: OrderEvent + TxEvent> {
    feed: Option<Feed>,
    symbol: Option<Symbol>,
    sources: Vec<EventSource>,
    depth_limit: Option<NonZeroUsize>,
    aggregation_period: Duration,
    listener: Option<DepthListener<O>>,
}

impl<O: OrderEvent + TxEvent> Default for MarketDepthModelBuilder<O> {
    fn default() -> Self {
        Self {
            feed: None,
            symbol: None,
            sources: Vec::new(),
            depth_limit: None,
            aggregation_period: Duration::ZERO,
            listener: None,
        }
    }
}

impl<O: OrderEvent + TxEvent> MarketDepthModelBuilder<O> {
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

    /// Maximum orders per side exposed to the listener; 0 means unbounded.
    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = NonZeroUsize::new(depth_limit);
        self
    }

    /// Minimum time between successive notifications; zero notifies immediately.
    pub fn with_aggregation_period(mut self, period: Duration) -> Self {
        self.aggregation_period = period;
        self
    }

    /// The book listener. Required.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&[Arc<O>], &[Arc<O>]) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Build the model. Fails with [`FeedError::InvalidArgument`] when the symbol or
    /// listener is unset.
    pub fn build(self) -> Result<MarketDepthModel<O>, FeedError> {
        let listener = self
            .listener
            .ok_or_else(|| FeedError::invalid_argument("listener is required"))?;
        let symbol = self
            .symbol
            .ok_or_else(|| FeedError::invalid_argument("symbol is required"))?;

        let core = Arc::new_cyclic(|weak_self| DepthCore {
            weak_self: weak_self.clone(),
            state: Mutex::new(DepthState {
                orders_by_index: FnvHashMap::default(),
                buy_orders: SortedOrderSet::new(self.depth_limit),
                sell_orders: SortedOrderSet::new(self.depth_limit),
                depth_limit: self.depth_limit,
                aggregation_period: self.aggregation_period,
            }),
            listener,
            tx_model: OnceLock::new(),
            task_scheduled: AtomicBool::new(false),
            task_timer: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        // The depth model needs whole transactions and whole snapshots: a snapshot
        // must clear the source exactly once before its events apply.
        let weak: Weak<DepthCore<O>> = Arc::downgrade(&core);
        let mut tx_builder = IndexedTxModel::<O>::builder()
            .with_symbol(symbol)
            .with_sources(self.sources)
            .with_batch_processing(true)
            .with_snapshot_processing(true)
            .with_listener(move |source, events, is_snapshot| {
                if let Some(core) = weak.upgrade() {
                    core.events_received(source, events, is_snapshot);
                }
            });

        if let Some(feed) = &self.feed {
            tx_builder = tx_builder.with_feed(feed);
        }

        let tx_model = tx_builder.build()?;
        let _ = core.tx_model.set(tx_model);

        Ok(MarketDepthModel { core })
    }
}

impl<O: OrderEvent + TxEvent> std::fmt::Debug for MarketDepthModelBuilder<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDepthModelBuilder")
            .field("symbol", &self.symbol)
            .field("sources", &self.sources)
            .field("depth_limit", &self.depth_limit)
            .field("aggregation_period", &self.aggregation_period)
            .finish()
    }
}

/// A per-symbol model of market depth: two sorted order sets fed by a transactional
/// model, with depth-limit truncation, source-scoped snapshot replacement, and
/// aggregation-period throttled listener notification.
pub struct MarketDepthModel<O: OrderEvent + TxEvent> {
    core: Arc<DepthCore<O>>,
}

impl<O: OrderEvent + TxEvent> MarketDepthModel<O> {
    pub fn builder() -> MarketDepthModelBuilder<O> {
        MarketDepthModelBuilder::default()
    }

    /// The depth limit; `None` is unbounded.
    pub fn depth_limit(&self) -> Option<NonZeroUsize> {
        self.core.state.lock().depth_limit
    }

    /// Change the depth limit. A change cancels any pending aggregated notification
    /// and notifies the listener immediately; setting the same value is a no-op.
    pub fn set_depth_limit(&self, depth_limit: usize) {
        let depth_limit = NonZeroUsize::new(depth_limit);

        {
            let mut state = self.core.state.lock();
            if state.depth_limit == depth_limit {
                return;
            }

            state.depth_limit = depth_limit;
            state.buy_orders.set_depth_limit(depth_limit);
            state.sell_orders.set_depth_limit(depth_limit);
        }

        self.core.try_cancel_task();
        self.core.notify_listeners();
    }

    pub fn aggregation_period(&self) -> Duration {
        self.core.state.lock().aggregation_period
    }

    /// Change the aggregation period. A running notification timer is rescheduled to
    /// the new period; setting the same value is a no-op.
    pub fn set_aggregation_period(&self, period: Duration) {
        {
            let mut state = self.core.state.lock();
            if state.aggregation_period == period {
                return;
            }
            state.aggregation_period = period;
        }

        self.core.reschedule_task_if_needed(period);
    }

    /// Current truncated buy-side snapshot, best first.
    pub fn buy_orders(&self) -> Vec<Arc<O>> {
        self.core.state.lock().buy_orders.to_vec()
    }

    /// Current truncated sell-side snapshot, best first.
    pub fn sell_orders(&self) -> Vec<Arc<O>> {
        self.core.state.lock().sell_orders.to_vec()
    }

    /// Number of live orders held, across both sides.
    pub fn order_count(&self) -> usize {
        self.core.state.lock().orders_by_index.len()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Close the model: cancels any pending notification and closes the underlying
    /// transactional model. Terminal and idempotent.
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(timer) = self.core.task_timer.lock().take() {
            timer.stop();
        }

        if let Some(tx_model) = self.core.tx_model.get() {
            tx_model.close();
        }
    }
}

impl<O: OrderEvent + TxEvent> std::fmt::Debug for MarketDepthModel<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDepthModel")
            .field("depth_limit", &self.depth_limit())
            .field("aggregation_period", &self.aggregation_period())
            .field("orders", &self.order_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Order;

    fn buy(price: f64, size: f64, index: i64) -> Arc<Order> {
        Arc::new(
            Order::new("AAPL")
                .with_index(index)
                .with_order_side(Side::Buy)
                .with_scope(Scope::Aggregate)
                .with_price(price)
                .with_size(size),
        )
    }

    mod comparator {
        use super::*;

        #[test]
        fn test_buy_side_is_descending_by_price() {
            let cheaper = buy(9.0, 1.0, 1);
            let dearer = buy(10.0, 1.0, 2);

            assert_eq!(
                <BuyRank as SideRank<Order>>::rank(&dearer, &cheaper),
                CmpOrdering::Less
            );
            assert_eq!(
                <SellRank as SideRank<Order>>::rank(&cheaper, &dearer),
                CmpOrdering::Less
            );
        }

        #[test]
        fn test_non_individual_larger_size_first() {
            let small = buy(10.0, 3.0, 1);
            let large = buy(10.0, 5.0, 2);

            assert_eq!(compare_orders(&*large, &*small), CmpOrdering::Less);
        }

        #[test]
        fn test_individual_orders_sort_after_aggregates() {
            let aggregate = buy(10.0, 1.0, 1);
            let individual = Arc::new(
                Order::new("AAPL")
                    .with_index(2)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Order)
                    .with_price(10.0)
                    .with_size(100.0),
            );

            assert_eq!(compare_orders(&*aggregate, &*individual), CmpOrdering::Less);
            assert_eq!(compare_orders(&*individual, &*aggregate), CmpOrdering::Greater);
        }

        #[test]
        fn test_individual_orders_sort_by_time_then_index() {
            let earlier = Arc::new(
                Order::new("AAPL")
                    .with_index(9)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Order)
                    .with_price(10.0)
                    .with_size(1.0)
                    .with_time(1_000),
            );
            let later = Arc::new(
                Order::new("AAPL")
                    .with_index(1)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Order)
                    .with_price(10.0)
                    .with_size(1.0)
                    .with_time(2_000),
            );

            assert_eq!(compare_orders(&*earlier, &*later), CmpOrdering::Less);

            let same_time = Arc::new(
                Order::new("AAPL")
                    .with_index(10)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Order)
                    .with_price(10.0)
                    .with_size(1.0)
                    .with_time(1_000),
            );
            assert_eq!(compare_orders(&*earlier, &*same_time), CmpOrdering::Less);
        }

        #[test]
        fn test_market_maker_breaks_ties() {
            let alpha = Arc::new(
                Order::new("AAPL")
                    .with_index(5)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Aggregate)
                    .with_price(10.0)
                    .with_size(1.0)
                    .with_market_maker("ALFA"),
            );
            let bravo = Arc::new(
                Order::new("AAPL")
                    .with_index(1)
                    .with_order_side(Side::Buy)
                    .with_scope(Scope::Aggregate)
                    .with_price(10.0)
                    .with_size(1.0)
                    .with_market_maker("BRVO"),
            );

            assert_eq!(compare_orders(&*alpha, &*bravo), CmpOrdering::Less);
        }
    }

    mod sorted_order_set {
        use super::*;

        #[test]
        fn test_insert_remove_round_trip() {
            let mut side = SortedOrderSet::<Order, BuyRank>::new(None);
            let order = buy(10.0, 1.0, 1);

            assert!(side.insert(Arc::clone(&order)));
            assert!(!side.insert(Arc::clone(&order)));
            assert!(side.is_changed());

            assert_eq!(side.to_vec().len(), 1);
            assert!(!side.is_changed());

            assert!(side.remove(&order));
            assert!(!side.remove(&order));
            assert!(side.is_changed());
            assert!(side.to_vec().is_empty());
        }

        #[test]
        fn test_truncation_and_ordering() {
            let mut side = SortedOrderSet::<Order, BuyRank>::new(NonZeroUsize::new(3));

            for (index, price) in [6.0, 10.0, 8.0, 7.0, 9.0].into_iter().enumerate() {
                side.insert(buy(price, 1.0, index as i64));
            }

            let snapshot = side.to_vec();
            let prices = snapshot.iter().map(|order| order.base.price).collect::<Vec<_>>();
            assert_eq!(prices, vec![10.0, 9.0, 8.0]);
        }

        #[test]
        fn test_tail_churn_beyond_window_is_not_dirty() {
            let mut side = SortedOrderSet::<Order, BuyRank>::new(NonZeroUsize::new(2));

            for (index, price) in [10.0, 9.0, 8.0].into_iter().enumerate() {
                side.insert(buy(price, 1.0, index as i64));
            }

            // Publish a snapshot so the window is [10, 9].
            assert_eq!(side.to_vec().len(), 2);
            assert!(!side.is_changed());

            // A new order strictly beyond the window does not mark the side dirty:
            // the set holds more than depth-limit orders and 7 sorts after the
            // window's last element.
            side.insert(buy(7.0, 1.0, 3));
            assert!(!side.is_changed());

            // An order inside the window does.
            side.insert(buy(9.5, 1.0, 4));
            assert!(side.is_changed());
        }

        #[test]
        fn test_set_depth_limit_marks_changed() {
            let mut side = SortedOrderSet::<Order, BuyRank>::new(None);
            side.insert(buy(10.0, 1.0, 1));
            side.to_vec();

            side.set_depth_limit(NonZeroUsize::new(1));
            assert!(side.is_changed());

            // Same value again does not re-mark.
            side.to_vec();
            side.set_depth_limit(NonZeroUsize::new(1));
            assert!(!side.is_changed());
        }

        #[test]
        fn test_clear_by_source() {
            let ntv = crate::event::source::OrderSource::ntv();
            let mut side = SortedOrderSet::<Order, BuyRank>::new(None);

            side.insert(Arc::new(
                Order::new("AAPL")
                    .with_index(1)
                    .with_source(&ntv)
                    .with_order_side(Side::Buy)
                    .with_price(10.0)
                    .with_size(1.0),
            ));
            side.insert(buy(9.0, 1.0, 2));
            side.to_vec();

            side.clear_by_source(&EventSource::from(ntv));
            assert!(side.is_changed());
            assert_eq!(side.to_vec().len(), 1);
        }
    }
}
