//! AdLens reporting.
//!
//! The top of the stack: runs the resolve/build/window/split pipeline
//! over every purchase in a period and assembles creative-level and
//! model-comparison reports.

pub mod pipeline;
pub mod report;

pub use pipeline::AttributionPipeline;
pub use report::{CreativeReport, CreativeRow, ModelReport, ModelRow, PurchaseAttribution};
