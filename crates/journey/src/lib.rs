//! AdLens journey assembly.
//!
//! Merges the touchpoint timelines of every resolved identity into one
//! chronological journey, then narrows it to an attribution window. The
//! resulting [`Journey`] is immutable: credit math downstream reads it,
//! never reshapes it.

pub mod builder;
pub mod window;

pub use builder::{Journey, JourneyBuilder, JourneyTouch};
pub use window::AttributionWindowFilter;
