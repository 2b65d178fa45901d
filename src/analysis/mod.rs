//! Classification and aggregation over fetched repositories.

pub mod aggregator;
pub mod classify;

pub use aggregator::*;
pub use classify::*;
