//! Event aggregation.
//!
//! The aggregator turns the hit collections of each finished event into
//! histogram fills and running tracker statistics.

pub mod aggregator;
pub mod tally;

pub use aggregator::EventAggregator;
