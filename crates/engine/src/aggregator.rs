//! Folds per-order credit splits into campaign-level totals.
//!
//! Aggregators are shared across attribution tasks via `Arc` and take
//! splits concurrently; merges are commutative, so the fold order never
//! changes the totals. Snapshots come back as `BTreeMap` so report rows
//! serialize in a stable order.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use adlens_core::types::{AdKey, TouchRole};

use crate::calculator::CreditSplit;
use crate::models::ModelCredit;

/// Running totals for one ad under the creative hybrid split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdKeyTotals {
    /// Orders this ad appeared in, regardless of role.
    pub contributed_orders: u64,
    /// Orders this ad closed.
    pub last_touch_orders: u64,
    /// Orders this ad closed as the only ad in the journey.
    pub single_touch_orders: u64,
    /// Weighted revenue earned across all roles.
    pub attributed_revenue: f64,
    /// Full order revenue of the orders this ad closed.
    pub last_touch_revenue: f64,
}

impl AdKeyTotals {
    fn merge(&mut self, other: &AdKeyTotals) {
        self.contributed_orders += other.contributed_orders;
        self.last_touch_orders += other.last_touch_orders;
        self.single_touch_orders += other.single_touch_orders;
        self.attributed_revenue += other.attributed_revenue;
        self.last_touch_revenue += other.last_touch_revenue;
    }
}

/// Concurrent accumulator for creative-split results.
#[derive(Default)]
pub struct Aggregator {
    totals: DashMap<AdKey, AdKeyTotals>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one order's split into the totals. `order_amount` is the full
    /// order revenue, credited in whole to the closer's last-touch line.
    pub fn absorb(&self, split: &CreditSplit, order_amount: f64) {
        for credit in &split.credits {
            let mut totals = self.totals.entry(credit.ad_key.clone()).or_default();
            totals.contributed_orders += 1;
            totals.attributed_revenue += credit.attributed_revenue;
            match credit.role {
                TouchRole::LastTouchPure => {
                    totals.last_touch_orders += 1;
                    totals.single_touch_orders += 1;
                    totals.last_touch_revenue += order_amount;
                }
                TouchRole::LastTouchAssisted => {
                    totals.last_touch_orders += 1;
                    totals.last_touch_revenue += order_amount;
                }
                TouchRole::Assist => {}
            }
        }
    }

    pub fn merge(&self, other: &Aggregator) {
        for entry in other.totals.iter() {
            self.totals
                .entry(entry.key().clone())
                .or_default()
                .merge(entry.value());
        }
    }

    /// Stable, ordered view of the totals.
    pub fn snapshot(&self) -> BTreeMap<AdKey, AdKeyTotals> {
        self.totals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Running totals for one ad under a generic weighting model. Order
/// counts are fractional: an ad that earned 0.25 of an order's weight
/// earned a quarter of an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTotals {
    pub attributed_orders: f64,
    pub attributed_revenue: f64,
}

/// Concurrent accumulator for generic-model results.
#[derive(Default)]
pub struct ModelAggregator {
    totals: DashMap<AdKey, ModelTotals>,
}

impl ModelAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&self, credits: &[ModelCredit]) {
        for credit in credits {
            let mut totals = self.totals.entry(credit.ad_key.clone()).or_default();
            totals.attributed_orders += credit.weight;
            totals.attributed_revenue += credit.attributed_revenue;
        }
    }

    pub fn snapshot(&self) -> BTreeMap<AdKey, ModelTotals> {
        self.totals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::AttributionCalculator;
    use adlens_core::types::{AttributionWindow, Touchpoint};
    use adlens_journey::{Journey, JourneyBuilder};
    use chrono::{Duration, Utc};

    fn journey_of(creatives_days: &[(&str, i64)]) -> Journey {
        let now = Utc::now();
        JourneyBuilder::build(
            creatives_days
                .iter()
                .map(|(creative, days_ago)| Touchpoint {
                    visitor_id: "v".to_string(),
                    ad_key: AdKey::from_creative(*creative, "meta", "cpc", "launch"),
                    entered_at: now - Duration::days(*days_ago),
                    sequence: 0,
                    duration_secs: 0,
                })
                .collect(),
        )
    }

    fn key(creative: &str) -> AdKey {
        AdKey::from_creative(creative, "meta", "cpc", "launch")
    }

    #[test]
    fn test_absorb_tracks_roles_and_revenue() {
        let aggregator = Aggregator::new();

        // Multi-ad order closed by "search".
        let multi = AttributionCalculator::creative_split(
            "o1",
            &journey_of(&[("feed", 10), ("search", 1)]),
            AttributionWindow::Days30,
            100_000.0,
        );
        aggregator.absorb(&multi, 100_000.0);

        // Single-ad order closed by "search" alone.
        let single = AttributionCalculator::creative_split(
            "o2",
            &journey_of(&[("search", 2)]),
            AttributionWindow::Days30,
            30_000.0,
        );
        aggregator.absorb(&single, 30_000.0);

        let snapshot = aggregator.snapshot();
        let search = &snapshot[&key("search")];
        assert_eq!(search.contributed_orders, 2);
        assert_eq!(search.last_touch_orders, 2);
        assert_eq!(search.single_touch_orders, 1);
        assert!((search.attributed_revenue - 80_000.0).abs() < 1e-6);
        assert!((search.last_touch_revenue - 130_000.0).abs() < 1e-6);

        let feed = &snapshot[&key("feed")];
        assert_eq!(feed.contributed_orders, 1);
        assert_eq!(feed.last_touch_orders, 0);
        assert!((feed.attributed_revenue - 50_000.0).abs() < 1e-6);
        assert_eq!(feed.last_touch_revenue, 0.0);
    }

    #[test]
    fn test_merge_is_commutative() {
        let split_a = AttributionCalculator::creative_split(
            "o1",
            &journey_of(&[("feed", 10), ("search", 1)]),
            AttributionWindow::Days30,
            40_000.0,
        );
        let split_b = AttributionCalculator::creative_split(
            "o2",
            &journey_of(&[("feed", 3)]),
            AttributionWindow::Days30,
            20_000.0,
        );

        let forward = Aggregator::new();
        forward.absorb(&split_a, 40_000.0);
        let tail = Aggregator::new();
        tail.absorb(&split_b, 20_000.0);
        forward.merge(&tail);

        let reverse = Aggregator::new();
        reverse.absorb(&split_b, 20_000.0);
        let head = Aggregator::new();
        head.absorb(&split_a, 40_000.0);
        reverse.merge(&head);

        assert_eq!(forward.snapshot(), reverse.snapshot());
    }

    #[test]
    fn test_model_aggregator_accumulates_fractional_orders() {
        let aggregator = ModelAggregator::new();
        let journey = journey_of(&[("a", 9), ("b", 5), ("a", 1)]);
        let credits = crate::models::model_split(&journey, adlens_core::types::WeightModel::Linear, 90_000.0);
        aggregator.absorb(&credits);
        aggregator.absorb(&credits);

        let snapshot = aggregator.snapshot();
        let a = &snapshot[&key("a")];
        assert!((a.attributed_orders - 4.0 / 3.0).abs() < 1e-9);
        assert!((a.attributed_revenue - 120_000.0).abs() < 1e-6);
    }
}
