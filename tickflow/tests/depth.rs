//! End-to-end market-depth scenarios over the in-process feed.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickflow::event::flags::EventFlags;
use tickflow::event::market::{Scope, Side};
use tickflow::event::source::OrderSource;
use tickflow::event::{FeedEvent, Order};
use tickflow::feed::Feed;
use tickflow::model::MarketDepthModel;

#[derive(Default)]
struct Recorder {
    calls: Mutex<usize>,
    buy: Mutex<Vec<(f64, f64)>>,
    sell: Mutex<Vec<(f64, f64)>>,
}

impl Recorder {
    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn buy(&self) -> Vec<(f64, f64)> {
        self.buy.lock().unwrap().clone()
    }

    fn sell(&self) -> Vec<(f64, f64)> {
        self.sell.lock().unwrap().clone()
    }
}

fn build_model(
    feed: &Feed,
    depth_limit: usize,
    aggregation_period: Duration,
) -> (MarketDepthModel<Order>, Arc<Recorder>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let recorder = Arc::new(Recorder::default());
    let recorder_in_listener = Arc::clone(&recorder);

    let model = MarketDepthModel::<Order>::builder()
        .with_feed(feed)
        .with_symbol("AAPL")
        .with_depth_limit(depth_limit)
        .with_aggregation_period(aggregation_period)
        .with_listener(move |buy: &[Arc<Order>], sell: &[Arc<Order>]| {
            *recorder_in_listener.calls.lock().unwrap() += 1;
            *recorder_in_listener.buy.lock().unwrap() = buy
                .iter()
                .map(|order| (order.base.price, order.base.size))
                .collect();
            *recorder_in_listener.sell.lock().unwrap() = sell
                .iter()
                .map(|order| (order.base.price, order.base.size))
                .collect();
        })
        .build()
        .unwrap();

    (model, recorder)
}

fn buy_order(index: i64, price: f64, size: f64) -> FeedEvent {
    FeedEvent::from(
        Order::new("AAPL")
            .with_index(index)
            .with_order_side(Side::Buy)
            .with_scope(Scope::Aggregate)
            .with_price(price)
            .with_size(size),
    )
}

#[test]
fn depth_limit_truncates_to_top_of_book() {
    let feed = Feed::default();
    let (_model, recorder) = build_model(&feed, 3, Duration::ZERO);

    feed.publish(
        [10.0, 9.0, 8.0, 7.0, 6.0]
            .into_iter()
            .enumerate()
            .map(|(index, price)| buy_order(index as i64 + 1, price, 1.0)),
    );

    assert_eq!(
        recorder.buy(),
        vec![(10.0, 1.0), (9.0, 1.0), (8.0, 1.0)]
    );
    assert!(recorder.sell().is_empty());
}

#[test]
fn source_scoped_snapshot_replaces_prior_book() {
    let feed = Feed::default();
    let (model, recorder) = build_model(&feed, 0, Duration::ZERO);
    let ntv = OrderSource::ntv();

    feed.publish([
        FeedEvent::from(
            Order::new("AAPL")
                .with_index(1)
                .with_source(&ntv)
                .with_order_side(Side::Buy)
                .with_scope(Scope::Aggregate)
                .with_price(10.0)
                .with_size(1.0),
        ),
        FeedEvent::from(
            Order::new("AAPL")
                .with_index(2)
                .with_source(&ntv)
                .with_order_side(Side::Buy)
                .with_scope(Scope::Aggregate)
                .with_price(9.0)
                .with_size(1.0),
        ),
    ]);

    assert_eq!(recorder.buy(), vec![(10.0, 1.0), (9.0, 1.0)]);

    // A snapshot from NTV replaces everything previously held for NTV. The final
    // snapshot event carries zero low index bits, per the publishing contract.
    feed.publish([FeedEvent::from(
        Order::new("AAPL")
            .with_index(0)
            .with_source(&ntv)
            .with_order_side(Side::Buy)
            .with_scope(Scope::Aggregate)
            .with_price(11.0)
            .with_size(1.0)
            .with_event_flags(EventFlags::SNAPSHOT_BEGIN | EventFlags::SNAPSHOT_END),
    )]);

    assert_eq!(recorder.buy(), vec![(11.0, 1.0)]);
    assert_eq!(model.order_count(), 1);
}

#[test]
fn aggregation_coalesces_updates_to_latest_state() {
    let feed = Feed::default();
    let (_model, recorder) = build_model(&feed, 0, Duration::from_millis(200));

    feed.publish([buy_order(1, 10.0, 5.0)]);
    std::thread::sleep(Duration::from_millis(50));
    feed.publish([buy_order(1, 10.0, 7.0)]);

    // Nothing fires before the period boundary.
    assert_eq!(recorder.calls(), 0);

    std::thread::sleep(Duration::from_millis(600));

    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.buy(), vec![(10.0, 7.0)]);
}

#[test]
fn zero_size_removes_the_order() {
    let feed = Feed::default();
    let (model, recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish([buy_order(1, 10.0, 5.0)]);
    assert_eq!(recorder.buy(), vec![(10.0, 5.0)]);

    feed.publish([buy_order(1, 10.0, 0.0)]);
    assert!(recorder.buy().is_empty());
    assert_eq!(model.order_count(), 0);

    // A subsequent event with the same index and nonzero size reinstates the entry
    // at its new sorted position.
    feed.publish([buy_order(2, 11.0, 1.0), buy_order(1, 9.0, 2.0)]);
    assert_eq!(recorder.buy(), vec![(11.0, 1.0), (9.0, 2.0)]);
}

#[test]
fn nan_size_removes_the_order() {
    let feed = Feed::default();
    let (model, recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish([buy_order(1, 10.0, 5.0)]);
    feed.publish([buy_order(1, 10.0, f64::NAN)]);

    assert!(recorder.buy().is_empty());
    assert_eq!(model.order_count(), 0);
}

#[test]
fn non_individual_orders_rank_by_size_within_a_price_level() {
    let feed = Feed::default();
    let (_model, recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish([buy_order(1, 10.0, 3.0), buy_order(2, 10.0, 5.0)]);

    assert_eq!(recorder.buy(), vec![(10.0, 5.0), (10.0, 3.0)]);
}

#[test]
fn book_sides_partition_the_index_map() {
    let feed = Feed::default();
    let (model, _recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish([
        buy_order(1, 10.0, 1.0),
        buy_order(2, 9.0, 1.0),
        FeedEvent::from(
            Order::new("AAPL")
                .with_index(3)
                .with_order_side(Side::Sell)
                .with_scope(Scope::Aggregate)
                .with_price(11.0)
                .with_size(1.0),
        ),
    ]);

    // At rest, every held order is on exactly one side.
    assert_eq!(
        model.order_count(),
        model.buy_orders().len() + model.sell_orders().len()
    );
}

#[test]
fn set_depth_limit_bounds_subsequent_callbacks() {
    let feed = Feed::default();
    let (model, recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish(
        (1..=5).map(|index| buy_order(index, 10.0 + index as f64, 1.0)),
    );
    assert_eq!(recorder.buy().len(), 5);

    model.set_depth_limit(2);
    assert_eq!(recorder.buy().len(), 2);

    feed.publish([buy_order(6, 20.0, 1.0)]);
    assert!(recorder.buy().len() <= 2);
    assert_eq!(recorder.buy()[0], (20.0, 1.0));
}

#[test]
fn close_stops_notifications() {
    let feed = Feed::default();
    let (model, recorder) = build_model(&feed, 0, Duration::ZERO);

    feed.publish([buy_order(1, 10.0, 1.0)]);
    let calls_before = recorder.calls();

    model.close();
    feed.publish([buy_order(2, 11.0, 1.0)]);

    assert_eq!(recorder.calls(), calls_before);
    assert!(model.is_closed());
}
