//! Role-based hybrid split for creative-level reporting.
//!
//! The journey first collapses to distinct ads, each represented by its
//! most recent appearance. A repeated ad is one influence, not several:
//! without the collapse, retargeting loops would hoard credit for
//! showing the same creative ten times.
//!
//! The most recent distinct ad is the closer. Alone in the journey it
//! takes the full amount; with assists present it takes half, and the
//! assists share the other half evenly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use adlens_core::types::{AdKey, AttributionWindow, TouchRole};
use adlens_journey::{Journey, JourneyTouch};

const CLOSER_SHARE: f64 = 0.5;

/// Revenue credit assigned to one distinct ad for one purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCredit {
    pub ad_key: AdKey,
    pub role: TouchRole,
    /// Fraction of the order this ad earned. Sums to 1.0 across the split.
    pub weight: f64,
    pub attributed_revenue: f64,
    /// When the ad was last seen before the purchase.
    pub last_seen_at: DateTime<Utc>,
}

/// The full credit assignment for one purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSplit {
    pub order_id: String,
    pub window: AttributionWindow,
    /// Credits in chronological order of last appearance; the closer,
    /// when present, is always the final entry.
    pub credits: Vec<AdCredit>,
}

impl CreditSplit {
    pub fn is_empty(&self) -> bool {
        self.credits.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.credits.iter().map(|c| c.weight).sum()
    }

    pub fn last_touch(&self) -> Option<&AdCredit> {
        self.credits.last()
    }
}

pub struct AttributionCalculator;

impl AttributionCalculator {
    /// Split an order's revenue across the distinct ads of its credited
    /// journey.
    ///
    /// An empty journey yields an empty split: the order is organic under
    /// this window, which is a result, not an error.
    pub fn creative_split(
        order_id: &str,
        journey: &Journey,
        window: AttributionWindow,
        amount: f64,
    ) -> CreditSplit {
        // Order distinct ads by last appearance; the final one is the
        // closer, everything before it assisted.
        let mut ordered: Vec<(AdKey, JourneyTouch)> =
            collapse_to_distinct(journey).into_iter().collect();
        ordered.sort_by_key(|(_, touch)| touch.position);

        let n = ordered.len();
        let credits: Vec<AdCredit> = ordered
            .into_iter()
            .enumerate()
            .map(|(idx, (ad_key, touch))| {
                let (role, weight) = if n == 1 {
                    (TouchRole::LastTouchPure, 1.0)
                } else if idx == n - 1 {
                    (TouchRole::LastTouchAssisted, CLOSER_SHARE)
                } else {
                    (TouchRole::Assist, CLOSER_SHARE / (n - 1) as f64)
                };
                AdCredit {
                    ad_key,
                    role,
                    weight,
                    attributed_revenue: amount * weight,
                    last_seen_at: touch.entered_at,
                }
            })
            .collect();

        debug!(
            order_id,
            window = %window,
            distinct_ads = credits.len(),
            "creative split computed"
        );
        CreditSplit {
            order_id: order_id.to_string(),
            window,
            credits,
        }
    }
}

/// Collapse a journey to distinct ads, each keyed to its most recent
/// touch. Touches are position-ordered, so the later entry wins.
fn collapse_to_distinct(journey: &Journey) -> BTreeMap<AdKey, JourneyTouch> {
    let mut distinct = BTreeMap::new();
    for touch in journey.touches() {
        distinct.insert(touch.ad_key.clone(), touch.clone());
    }
    distinct
}
