//! AdLens core — domain types, error taxonomy, configuration, and the
//! fact-store boundary shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use error::{AttributionError, AttributionResult};
pub use store::{FactStore, InMemoryFactStore};
