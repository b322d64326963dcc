//! Generic position-weighting models for campaign-level comparisons.
//!
//! Unlike the creative split, these models weight raw touches rather
//! than distinct ads: a creative that reached the customer three times
//! earns three touches' worth of weight, summed per ad afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use adlens_core::types::{AdKey, WeightModel};
use adlens_journey::Journey;

/// Revenue credit for one ad under a generic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCredit {
    pub ad_key: AdKey,
    /// Summed weight across the ad's touches. Sums to 1.0 over the split.
    pub weight: f64,
    pub attributed_revenue: f64,
}

/// Per-touch weights for the journey under the given model, aligned
/// index-for-index with `journey.touches()`. Weights are normalized to
/// sum to 1.0; an empty journey yields an empty vector.
pub fn position_weights(journey: &Journey, model: WeightModel) -> Vec<f64> {
    let n = journey.len();
    if n == 0 {
        return Vec::new();
    }
    match model {
        WeightModel::FirstTouch => {
            let mut weights = vec![0.0; n];
            weights[0] = 1.0;
            weights
        }
        WeightModel::LastTouch => {
            let mut weights = vec![0.0; n];
            weights[n - 1] = 1.0;
            weights
        }
        WeightModel::Linear => vec![1.0 / n as f64; n],
        WeightModel::TimeDecay => {
            // Each touch carries double the weight of the one before it,
            // indexed within the windowed sequence.
            let raw: Vec<f64> = (0..n).map(|idx| 2f64.powi(idx as i32)).collect();
            normalize(raw)
        }
        WeightModel::DurationWeighted => {
            let raw: Vec<f64> = journey
                .touches()
                .iter()
                .map(|t| f64::from(t.duration_secs))
                .collect();
            if raw.iter().all(|&d| d == 0.0) {
                // No dwell data at all: fall back to an even split.
                vec![1.0 / n as f64; n]
            } else {
                normalize(raw)
            }
        }
    }
}

fn normalize(raw: Vec<f64>) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Split an order's revenue across ads under a generic model, summing
/// the weights of an ad's repeated touches into one credit. Credits come
/// back in ad-key order.
pub fn model_split(journey: &Journey, model: WeightModel, amount: f64) -> Vec<ModelCredit> {
    let weights = position_weights(journey, model);
    let mut per_ad: BTreeMap<AdKey, f64> = BTreeMap::new();
    for (touch, weight) in journey.touches().iter().zip(weights) {
        *per_ad.entry(touch.ad_key.clone()).or_insert(0.0) += weight;
    }
    per_ad
        .into_iter()
        .map(|(ad_key, weight)| ModelCredit {
            ad_key,
            weight,
            attributed_revenue: amount * weight,
        })
        .collect()
}
