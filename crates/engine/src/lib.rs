//! AdLens attribution engine.
//!
//! Turns a windowed journey plus an order amount into per-ad revenue
//! credits, under either the role-based hybrid split used for creative
//! reporting or one of the generic position-weighting models, and folds
//! the per-order results into campaign-level totals.

pub mod aggregator;
pub mod calculator;
pub mod models;

pub use aggregator::{AdKeyTotals, Aggregator, ModelAggregator, ModelTotals};
pub use calculator::{AdCredit, AttributionCalculator, CreditSplit};
pub use models::{model_split, position_weights, ModelCredit};
