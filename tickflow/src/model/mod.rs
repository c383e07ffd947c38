/// Market-depth aggregation over the order event family.
pub mod depth;

/// Transactional models over indexed and time-series event streams.
pub mod tx;

pub use depth::{MarketDepthModel, MarketDepthModelBuilder};
pub use tx::{
    IndexedTxModel, IndexedTxModelBuilder, TimeSeriesTxModel, TimeSeriesTxModelBuilder, TxEvent,
};
