#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Tickflow
//! A client-side runtime for real-time market-data distribution. It connects a process
//! to a feed, maintains per-symbol subscriptions over typed market events, and
//! synthesizes derived views on top of the raw stream. It is:
//! * **Typed**: every market observation is a concrete value type - quotes, trades,
//!   orders, candles, option analytics - routed through one tagged [`FeedEvent`](event::FeedEvent) union.
//! * **Transactional**: indexed event streams are grouped into per-source transactions
//!   and snapshots by [`IndexedTxModel`](model::IndexedTxModel), so listeners only ever
//!   observe consistent units.
//! * **Aggregated**: [`MarketDepthModel`](model::MarketDepthModel) maintains a
//!   depth-limited, comparator-sorted order book per symbol with throttled fan-out.
//!
//! ## User API
//! - [`FeedSubscription`](subscription::FeedSubscription) for subscribing to
//!   (event kinds x symbols) with batched listener delivery.
//! - [`Feed`](feed::Feed) as the in-process gateway the subscriptions bind to.
//! - [`IndexedTxModel`](model::IndexedTxModel) /
//!   [`TimeSeriesTxModel`](model::TimeSeriesTxModel) for transaction-consistent
//!   consumption of indexed event families.
//! - [`MarketDepthModel`](model::MarketDepthModel) for a live order book.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tickflow::event::market::Side;
//! use tickflow::event::source::OrderSource;
//! use tickflow::event::{FeedEvent, Order};
//! use tickflow::feed::Feed;
//! use tickflow::model::MarketDepthModel;
//!
//! let feed = Feed::default();
//!
//! let model = MarketDepthModel::<Order>::builder()
//!     .with_feed(&feed)
//!     .with_symbol("AAPL")
//!     .with_sources([OrderSource::ntv()])
//!     .with_depth_limit(10)
//!     .with_aggregation_period(Duration::from_millis(100))
//!     .with_listener(|buy: &[Arc<Order>], sell: &[Arc<Order>]| {
//!         println!("book: {} buys, {} sells", buy.len(), sell.len());
//!     })
//!     .build()
//!     .expect("model configuration is valid");
//!
//! feed.publish([FeedEvent::from(
//!     Order::new("AAPL")
//!         .with_index(1)
//!         .with_source(&OrderSource::ntv())
//!         .with_order_side(Side::Buy)
//!         .with_price(189.25)
//!         .with_size(100.0),
//! )]);
//! # model.close();
//! ```

/// Recognized configuration option sets and their defaults.
pub mod config;

/// All [`Error`](std::error::Error)s generated in Tickflow.
pub mod error;

/// Event value types, flags, sources and the [`FeedEvent`](event::FeedEvent) union.
pub mod event;

/// The feed gateway surface and the in-process hub implementation.
pub mod feed;

/// Transactional and market-depth models built on top of subscriptions.
pub mod model;

/// The typed entity registry used to route inbound callbacks across the transport
/// boundary.
pub mod registry;

/// Async stream adapter over subscription batches.
pub mod stream;

/// The subscription surface: observable symbol sets with batched delivery.
pub mod subscription;

/// Subscription symbols and their time-series / source decorations.
pub mod symbol;

/// The cooperative aggregation timer.
pub mod timer;

pub use config::{DepthOptions, FeedConfig, SubscriptionOptions, TxOptions};
pub use error::FeedError;
pub use event::{EventKind, FeedEvent};
pub use feed::Feed;
pub use subscription::{FeedSubscription, TimeSeriesFeedSubscription};
pub use symbol::Symbol;

// Dev-dependency used by integration tests for log capture.
#[cfg(test)]
use tracing_subscriber as _;
