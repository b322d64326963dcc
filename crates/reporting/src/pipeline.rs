//! The attribution pipeline: resolve, merge, window, split, aggregate.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use adlens_core::config::AppConfig;
use adlens_core::types::{AttributionWindow, MatchingMode, Purchase, TimeRange, WeightModel};
use adlens_core::{AttributionError, AttributionResult, FactStore};
use adlens_engine::{model_split, Aggregator, AttributionCalculator, ModelAggregator};
use adlens_identity::IdentityResolver;
use adlens_journey::{AttributionWindowFilter, Journey, JourneyBuilder};

use crate::report::{CreativeReport, ModelReport, PurchaseAttribution};

/// Runs attribution for single purchases and whole reporting periods.
///
/// Cheap to clone; report runs clone it into one task per purchase,
/// bounded by the configured concurrency limit.
#[derive(Clone)]
pub struct AttributionPipeline {
    store: Arc<dyn FactStore>,
    resolver: IdentityResolver,
    max_concurrency: usize,
}

impl AttributionPipeline {
    pub fn new(store: Arc<dyn FactStore>, resolver: IdentityResolver, max_concurrency: usize) -> Self {
        Self {
            store,
            resolver,
            max_concurrency,
        }
    }

    pub fn from_config(store: Arc<dyn FactStore>, config: &AppConfig) -> Self {
        let resolver = IdentityResolver::from_config(Arc::clone(&store), &config.identity);
        Self::new(store, resolver, config.runtime.max_concurrency)
    }

    /// Resolve identities and build the credited and display journeys for
    /// one purchase.
    fn resolve_journeys(
        &self,
        purchase: &Purchase,
        window: AttributionWindow,
        mode: MatchingMode,
    ) -> AttributionResult<(BTreeSet<String>, Journey, Journey)> {
        let resolved = self.resolver.resolve(purchase, mode)?;
        let touchpoints = self.store.load_touchpoints(&resolved, None)?;
        let merged = JourneyBuilder::build(touchpoints);
        let credited =
            AttributionWindowFilter::for_credit(&merged, window, purchase.purchased_at);
        let display = AttributionWindowFilter::for_display(&merged, window, purchase.purchased_at);
        Ok((resolved, credited, display))
    }

    /// Attribute one purchase under the creative hybrid split.
    pub fn attribute_purchase(
        &self,
        purchase: &Purchase,
        window: AttributionWindow,
        mode: MatchingMode,
    ) -> AttributionResult<PurchaseAttribution> {
        let (resolved, credited, display) = self.resolve_journeys(purchase, window, mode)?;
        let split = AttributionCalculator::creative_split(
            &purchase.order_id,
            &credited,
            window,
            purchase.amount,
        );
        Ok(PurchaseAttribution::new(purchase, resolved, split, display))
    }

    /// Creative-level report over all purchases in the period.
    pub async fn creative_report(
        &self,
        period: TimeRange,
        window: AttributionWindow,
        mode: MatchingMode,
    ) -> AttributionResult<CreativeReport> {
        let purchases = self.store.load_purchases(&period)?;
        let total_orders = purchases.len() as u64;
        let aggregator = Arc::new(Aggregator::new());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut handles = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            let pipeline = self.clone();
            let aggregator = Arc::clone(&aggregator);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(anyhow::Error::from)?;
                let attribution = pipeline.attribute_purchase(&purchase, window, mode)?;
                aggregator.absorb(&attribution.split, purchase.amount);
                Ok::<bool, AttributionError>(!attribution.is_organic())
            }));
        }

        let mut attributed_orders = 0u64;
        for handle in handles {
            if handle.await.map_err(anyhow::Error::from)?? {
                attributed_orders += 1;
            }
        }

        info!(
            window = %window,
            mode = %mode,
            total_orders,
            attributed_orders,
            "creative report computed"
        );
        Ok(CreativeReport::new(
            period,
            window,
            mode,
            total_orders,
            attributed_orders,
            aggregator.snapshot(),
        ))
    }

    /// Campaign-level report under a generic weighting model.
    pub async fn model_report(
        &self,
        period: TimeRange,
        window: AttributionWindow,
        mode: MatchingMode,
        model: WeightModel,
    ) -> AttributionResult<ModelReport> {
        let purchases = self.store.load_purchases(&period)?;
        let total_orders = purchases.len() as u64;
        let aggregator = Arc::new(ModelAggregator::new());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut handles = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            let pipeline = self.clone();
            let aggregator = Arc::clone(&aggregator);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(anyhow::Error::from)?;
                let (_, credited, _) = pipeline.resolve_journeys(&purchase, window, mode)?;
                let credits = model_split(&credited, model, purchase.amount);
                aggregator.absorb(&credits);
                Ok::<(), AttributionError>(())
            }));
        }
        for handle in handles {
            handle.await.map_err(anyhow::Error::from)??;
        }

        info!(
            window = %window,
            mode = %mode,
            model = %model,
            total_orders,
            "model report computed"
        );
        Ok(ModelReport::new(
            period,
            window,
            mode,
            model,
            total_orders,
            aggregator.snapshot(),
        ))
    }
}
