//! Fact-store boundary.
//!
//! The attribution core never talks to a database: it consumes facts
//! through [`FactStore`], and the reporting service wires in whatever
//! adapter fronts its store. [`InMemoryFactStore`] backs tests and the
//! demo binary.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::info;

use crate::error::AttributionResult;
use crate::types::{AdKey, Identity, Purchase, TimeRange, Touchpoint};

/// Read-only access to touchpoint, purchase, and identity facts.
///
/// Every method returns `Result`: a store failure is a hard error for the
/// caller, distinct from "the query ran and found nothing". Implementations
/// must uphold the ingestion contract on [`FactStore::load_purchases`]:
/// only paid, non-cancelled, positive-amount orders are returned.
pub trait FactStore: Send + Sync {
    /// All touchpoints of the given visitors, optionally restricted to a
    /// time range.
    fn load_touchpoints(
        &self,
        visitor_ids: &BTreeSet<String>,
        range: Option<&TimeRange>,
    ) -> AttributionResult<Vec<Touchpoint>>;

    /// Purchases within the range, pre-filtered by the ingestion layer.
    fn load_purchases(&self, range: &TimeRange) -> AttributionResult<Vec<Purchase>>;

    /// Identity attributes for one visitor.
    fn identity(&self, visitor_id: &str) -> AttributionResult<Option<Identity>>;

    /// Identity reached by following the purchase's session link, for
    /// orders whose nominal visitor differs from the session's actual one.
    fn resolve_secondary_identity(&self, purchase: &Purchase)
        -> AttributionResult<Option<Identity>>;

    /// Every identity sharing a linked account id.
    fn find_by_account(&self, account_id: &str) -> AttributionResult<Vec<Identity>>;

    /// Every identity sharing an exact device fingerprint.
    fn find_by_fingerprint(&self, fingerprint: &str) -> AttributionResult<Vec<Identity>>;

    /// Number of distinct identities carrying the fingerprint, for the
    /// collision-threshold check.
    fn fingerprint_cardinality(&self, fingerprint: &str) -> AttributionResult<usize>;

    /// Total time the two visitors' session activity windows overlap.
    fn session_overlap(&self, visitor_a: &str, visitor_b: &str) -> AttributionResult<Duration>;
}

// ─── In-memory adapter ──────────────────────────────────────────────────

/// DashMap-backed fact store for tests and demos.
#[derive(Default)]
pub struct InMemoryFactStore {
    identities: DashMap<String, Identity>,
    /// Touchpoints by visitor, in insertion order.
    touchpoints: DashMap<String, Vec<Touchpoint>>,
    purchases: DashMap<String, Purchase>,
    /// Checkout session id -> the visitor the session actually belongs to.
    session_links: DashMap<String, String>,
    /// Session activity windows by visitor, for the overlap guard.
    activity: DashMap<String, Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_identity(&self, identity: Identity) {
        self.identities
            .insert(identity.visitor_id.clone(), identity);
    }

    /// Record a touchpoint, assigning the next per-visitor sequence index.
    pub fn record_touchpoint(
        &self,
        visitor_id: impl Into<String>,
        ad_key: AdKey,
        entered_at: DateTime<Utc>,
        duration_secs: u32,
    ) {
        let visitor_id = visitor_id.into();
        let mut timeline = self.touchpoints.entry(visitor_id.clone()).or_default();
        let sequence = timeline.len() as u32 + 1;
        timeline.push(Touchpoint {
            visitor_id,
            ad_key,
            entered_at,
            sequence,
            duration_secs,
        });
    }

    pub fn record_purchase(&self, purchase: Purchase) {
        self.purchases.insert(purchase.order_id.clone(), purchase);
    }

    pub fn link_session(&self, session_id: impl Into<String>, visitor_id: impl Into<String>) {
        self.session_links.insert(session_id.into(), visitor_id.into());
    }

    pub fn record_activity(
        &self,
        visitor_id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        self.activity
            .entry(visitor_id.into())
            .or_default()
            .push((start, end));
    }

    /// Seed a small cross-device scenario for the demo binary: one
    /// customer fragmented across three identities (login link plus a
    /// fingerprint match), one clean single-touch customer.
    pub fn seed_demo_data(&self) {
        let now = Utc::now();
        let day = |d: i64| now - Duration::days(d);

        let meta_feed = AdKey::with_ad_id("23851", "spring_feed_v2", "meta", "cpc", "spring_launch");
        let meta_story = AdKey::with_ad_id("23852", "spring_story_v1", "meta", "cpc", "spring_launch");
        let search_ad = AdKey::from_creative("brand_search", "naver", "sa", "always_on");

        // Customer A: phone browser, in-app browser, and desktop at work.
        self.upsert_identity(
            Identity::new("v_phone")
                .with_account("acct_1001")
                .with_fingerprint("fp_pixel8_chrome"),
        );
        self.upsert_identity(Identity::new("v_inapp").with_account("acct_1001"));
        self.upsert_identity(Identity::new("v_desktop").with_fingerprint("fp_pixel8_chrome"));

        self.record_touchpoint("v_phone", meta_feed.clone(), day(18), 210);
        self.record_touchpoint("v_inapp", meta_story.clone(), day(9), 45);
        self.record_touchpoint("v_desktop", search_ad.clone(), day(2), 380);

        self.record_purchase(Purchase {
            order_id: "ord-20001".to_string(),
            visitor_id: "v_phone".to_string(),
            account_id: Some("acct_1001".to_string()),
            session_id: None,
            purchased_at: day(1),
            amount: 68_000.0,
        });

        // Customer B: single ad, single purchase.
        self.upsert_identity(Identity::new("v_single"));
        self.record_touchpoint("v_single", search_ad, day(4), 95);
        self.record_purchase(Purchase {
            order_id: "ord-20002".to_string(),
            visitor_id: "v_single".to_string(),
            account_id: None,
            session_id: None,
            purchased_at: day(3),
            amount: 24_500.0,
        });

        info!(
            identities = self.identities.len(),
            purchases = self.purchases.len(),
            "demo fact data seeded"
        );
    }
}

impl FactStore for InMemoryFactStore {
    fn load_touchpoints(
        &self,
        visitor_ids: &BTreeSet<String>,
        range: Option<&TimeRange>,
    ) -> AttributionResult<Vec<Touchpoint>> {
        let mut out = Vec::new();
        for visitor_id in visitor_ids {
            if let Some(timeline) = self.touchpoints.get(visitor_id) {
                out.extend(
                    timeline
                        .iter()
                        .filter(|t| range.map_or(true, |r| r.contains(t.entered_at)))
                        .cloned(),
                );
            }
        }
        Ok(out)
    }

    fn load_purchases(&self, range: &TimeRange) -> AttributionResult<Vec<Purchase>> {
        let mut out: Vec<Purchase> = self
            .purchases
            .iter()
            .filter(|entry| range.contains(entry.purchased_at) && entry.amount > 0.0)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| {
            a.purchased_at
                .cmp(&b.purchased_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        Ok(out)
    }

    fn identity(&self, visitor_id: &str) -> AttributionResult<Option<Identity>> {
        Ok(self.identities.get(visitor_id).map(|i| i.clone()))
    }

    fn resolve_secondary_identity(
        &self,
        purchase: &Purchase,
    ) -> AttributionResult<Option<Identity>> {
        let Some(session_id) = purchase.session_id.as_deref() else {
            return Ok(None);
        };
        let Some(visitor_id) = self.session_links.get(session_id) else {
            return Ok(None);
        };
        if *visitor_id == purchase.visitor_id {
            return Ok(None);
        }
        // The session may belong to a visitor with no identity row yet;
        // still return it so its touchpoints are merged.
        Ok(Some(
            self.identities
                .get(visitor_id.value())
                .map(|i| i.clone())
                .unwrap_or_else(|| Identity::new(visitor_id.clone())),
        ))
    }

    fn find_by_account(&self, account_id: &str) -> AttributionResult<Vec<Identity>> {
        let mut out: Vec<Identity> = self
            .identities
            .iter()
            .filter(|entry| entry.account_id.as_deref() == Some(account_id))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| a.visitor_id.cmp(&b.visitor_id));
        Ok(out)
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> AttributionResult<Vec<Identity>> {
        let mut out: Vec<Identity> = self
            .identities
            .iter()
            .filter(|entry| entry.fingerprint.as_deref() == Some(fingerprint))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| a.visitor_id.cmp(&b.visitor_id));
        Ok(out)
    }

    fn fingerprint_cardinality(&self, fingerprint: &str) -> AttributionResult<usize> {
        let distinct: HashSet<String> = self
            .identities
            .iter()
            .filter(|entry| entry.fingerprint.as_deref() == Some(fingerprint))
            .map(|entry| entry.visitor_id.clone())
            .collect();
        Ok(distinct.len())
    }

    fn session_overlap(&self, visitor_a: &str, visitor_b: &str) -> AttributionResult<Duration> {
        let empty = Vec::new();
        let windows_a = self.activity.get(visitor_a);
        let windows_a = windows_a.as_deref().unwrap_or(&empty);
        let windows_b = self.activity.get(visitor_b);
        let windows_b = windows_b.as_deref().unwrap_or(&empty);

        let mut total = Duration::zero();
        for (start_a, end_a) in windows_a {
            for (start_b, end_b) in windows_b {
                let start = (*start_a).max(*start_b);
                let end = (*end_a).min(*end_b);
                if end > start {
                    total = total + (end - start);
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(creative: &str) -> AdKey {
        AdKey::from_creative(creative, "meta", "cpc", "test")
    }

    #[test]
    fn test_touchpoint_sequence_assignment() {
        let store = InMemoryFactStore::new();
        let now = Utc::now();
        store.record_touchpoint("v1", ad("a"), now - Duration::days(2), 0);
        store.record_touchpoint("v1", ad("b"), now - Duration::days(1), 0);

        let ids: BTreeSet<String> = ["v1".to_string()].into();
        let touches = store.load_touchpoints(&ids, None).unwrap();
        assert_eq!(touches.len(), 2);
        assert_eq!(touches[0].sequence, 1);
        assert_eq!(touches[1].sequence, 2);
    }

    #[test]
    fn test_load_touchpoints_respects_range() {
        let store = InMemoryFactStore::new();
        let now = Utc::now();
        store.record_touchpoint("v1", ad("a"), now - Duration::days(40), 0);
        store.record_touchpoint("v1", ad("b"), now - Duration::days(5), 0);

        let ids: BTreeSet<String> = ["v1".to_string()].into();
        let range = TimeRange::new(now - Duration::days(30), now);
        let touches = store.load_touchpoints(&ids, Some(&range)).unwrap();
        assert_eq!(touches.len(), 1);
        assert_eq!(touches[0].ad_key.creative, "b");
    }

    #[test]
    fn test_secondary_identity_via_session_link() {
        let store = InMemoryFactStore::new();
        store.upsert_identity(Identity::new("v_actual"));
        store.link_session("sess-9", "v_actual");

        let purchase = Purchase {
            order_id: "o1".to_string(),
            visitor_id: "v_nominal".to_string(),
            account_id: None,
            session_id: Some("sess-9".to_string()),
            purchased_at: Utc::now(),
            amount: 100.0,
        };
        let secondary = store.resolve_secondary_identity(&purchase).unwrap();
        assert_eq!(secondary.unwrap().visitor_id, "v_actual");

        // Same visitor on both sides: no secondary identity.
        let purchase_same = Purchase {
            visitor_id: "v_actual".to_string(),
            ..purchase
        };
        assert!(store
            .resolve_secondary_identity(&purchase_same)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_session_overlap_sums_intersections() {
        let store = InMemoryFactStore::new();
        let t0 = Utc::now();
        store.record_activity("a", t0, t0 + Duration::seconds(120));
        store.record_activity("b", t0 + Duration::seconds(30), t0 + Duration::seconds(200));

        let overlap = store.session_overlap("a", "b").unwrap();
        assert_eq!(overlap, Duration::seconds(90));

        let none = store.session_overlap("a", "missing").unwrap();
        assert_eq!(none, Duration::zero());
    }

    #[test]
    fn test_fingerprint_queries() {
        let store = InMemoryFactStore::new();
        for i in 0..3 {
            store.upsert_identity(Identity::new(format!("v{i}")).with_fingerprint("fp_x"));
        }
        store.upsert_identity(Identity::new("v_other").with_fingerprint("fp_y"));

        assert_eq!(store.fingerprint_cardinality("fp_x").unwrap(), 3);
        let found = store.find_by_fingerprint("fp_x").unwrap();
        assert_eq!(found.len(), 3);
        // Deterministic ordering by visitor id.
        assert_eq!(found[0].visitor_id, "v0");
        assert_eq!(found[2].visitor_id, "v2");
    }
}
