//! Report payloads returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use adlens_core::types::{
    AdKey, AttributionWindow, MatchingMode, Purchase, TimeRange, WeightModel,
};
use adlens_engine::{AdKeyTotals, CreditSplit, ModelTotals};
use adlens_journey::Journey;

/// One purchase fully attributed: its resolved identity set, the credit
/// split actually used for revenue, and the unwindowed journey shown to
/// analysts next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseAttribution {
    pub order_id: String,
    pub amount: f64,
    pub purchased_at: DateTime<Utc>,
    pub resolved_identities: BTreeSet<String>,
    pub split: CreditSplit,
    pub display_journey: Journey,
}

impl PurchaseAttribution {
    pub fn new(
        purchase: &Purchase,
        resolved_identities: BTreeSet<String>,
        split: CreditSplit,
        display_journey: Journey,
    ) -> Self {
        Self {
            order_id: purchase.order_id.clone(),
            amount: purchase.amount,
            purchased_at: purchase.purchased_at,
            resolved_identities,
            split,
            display_journey,
        }
    }

    /// True when no ad earned credit under the window: an organic order.
    pub fn is_organic(&self) -> bool {
        self.split.is_empty()
    }
}

/// One row of a creative report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeRow {
    pub ad_key: AdKey,
    #[serde(flatten)]
    pub totals: AdKeyTotals,
}

/// Creative-level attribution report over a reporting period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub period: TimeRange,
    pub window: AttributionWindow,
    pub matching_mode: MatchingMode,
    pub total_orders: u64,
    /// Orders where at least one ad earned credit.
    pub attributed_orders: u64,
    /// Rows sorted by attributed revenue, highest first.
    pub rows: Vec<CreativeRow>,
}

impl CreativeReport {
    pub fn new(
        period: TimeRange,
        window: AttributionWindow,
        matching_mode: MatchingMode,
        total_orders: u64,
        attributed_orders: u64,
        totals: std::collections::BTreeMap<AdKey, AdKeyTotals>,
    ) -> Self {
        let mut rows: Vec<CreativeRow> = totals
            .into_iter()
            .map(|(ad_key, totals)| CreativeRow { ad_key, totals })
            .collect();
        rows.sort_by(|a, b| {
            b.totals
                .attributed_revenue
                .total_cmp(&a.totals.attributed_revenue)
                .then_with(|| a.ad_key.cmp(&b.ad_key))
        });
        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            period,
            window,
            matching_mode,
            total_orders,
            attributed_orders,
            rows,
        }
    }
}

/// One row of a model-comparison report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    pub ad_key: AdKey,
    #[serde(flatten)]
    pub totals: ModelTotals,
}

/// Campaign-level report under one generic weighting model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub period: TimeRange,
    pub window: AttributionWindow,
    pub matching_mode: MatchingMode,
    pub model: WeightModel,
    pub total_orders: u64,
    pub rows: Vec<ModelRow>,
}

impl ModelReport {
    pub fn new(
        period: TimeRange,
        window: AttributionWindow,
        matching_mode: MatchingMode,
        model: WeightModel,
        total_orders: u64,
        totals: std::collections::BTreeMap<AdKey, ModelTotals>,
    ) -> Self {
        let mut rows: Vec<ModelRow> = totals
            .into_iter()
            .map(|(ad_key, totals)| ModelRow { ad_key, totals })
            .collect();
        rows.sort_by(|a, b| {
            b.totals
                .attributed_revenue
                .total_cmp(&a.totals.attributed_revenue)
                .then_with(|| a.ad_key.cmp(&b.ad_key))
        });
        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            period,
            window,
            matching_mode,
            model,
            total_orders,
            rows,
        }
    }
}
