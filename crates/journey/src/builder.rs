//! Merges per-identity timelines into a single ordered journey.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adlens_core::types::{AdKey, Touchpoint};

/// One step of a merged journey.
///
/// `position` is 1-based and assigned after merging, so two devices'
/// interleaved timelines number as one sequence. The per-visitor
/// `sequence` on the raw touchpoint is deliberately not carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyTouch {
    pub ad_key: AdKey,
    pub entered_at: DateTime<Utc>,
    pub position: u32,
    pub duration_secs: u32,
}

/// An immutable, chronologically ordered ad journey for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    touches: Vec<JourneyTouch>,
}

impl Journey {
    pub fn empty() -> Self {
        Self { touches: Vec::new() }
    }

    pub(crate) fn from_touches(touches: Vec<JourneyTouch>) -> Self {
        Self { touches }
    }

    pub fn touches(&self) -> &[JourneyTouch] {
        &self.touches
    }

    pub fn len(&self) -> usize {
        self.touches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touches.is_empty()
    }

    /// Most recent touch, by merged position.
    pub fn last(&self) -> Option<&JourneyTouch> {
        self.touches.last()
    }
}

/// Builds a [`Journey`] from the union of resolved identities' timelines.
pub struct JourneyBuilder;

impl JourneyBuilder {
    /// Merge, order, dedupe, and number the given touchpoints.
    ///
    /// Ordering is by `entered_at` with the ad key as a tie-break, so
    /// same-instant touches from two devices always land in the same
    /// order. Exact duplicates (same instant, same ad) collapse to one
    /// touch; they are the same event reported through two identities.
    pub fn build(touchpoints: Vec<Touchpoint>) -> Journey {
        let mut touchpoints = touchpoints;
        touchpoints.sort_by(|a, b| {
            a.entered_at
                .cmp(&b.entered_at)
                .then_with(|| a.ad_key.cmp(&b.ad_key))
        });
        touchpoints.dedup_by(|a, b| a.entered_at == b.entered_at && a.ad_key == b.ad_key);

        let touches = touchpoints
            .into_iter()
            .enumerate()
            .map(|(idx, t)| JourneyTouch {
                ad_key: t.ad_key,
                entered_at: t.entered_at,
                position: idx as u32 + 1,
                duration_secs: t.duration_secs,
            })
            .collect();
        Journey::from_touches(touches)
    }
}
