//! Resolves the set of tracking identities behind one purchase.
//!
//! Resolution is additive and guarded: a link that looks unsafe is
//! dropped, never escalated to an error, so a noisy fingerprint can at
//! worst shrink a journey back to what strict matching would have seen.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use adlens_core::config::IdentityConfig;
use adlens_core::types::{Identity, MatchingMode, Purchase};
use adlens_core::{AttributionResult, FactStore};

/// Collapses fragmented identities into one visitor-id set per purchase.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn FactStore>,
    /// Fingerprints shared by more than this many identities are ignored.
    collision_threshold: usize,
    /// Candidates overlapping the purchaser's sessions by at least this
    /// long are a different person on the same device.
    overlap_guard: Duration,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn FactStore>,
        collision_threshold: usize,
        overlap_guard: Duration,
    ) -> Self {
        Self {
            store,
            collision_threshold,
            overlap_guard,
        }
    }

    pub fn from_config(store: Arc<dyn FactStore>, config: &IdentityConfig) -> Self {
        Self::new(
            store,
            config.fingerprint_collision_threshold,
            Duration::seconds(config.session_overlap_guard_secs),
        )
    }

    /// Resolve every visitor id belonging to the purchaser.
    ///
    /// Strict mode follows deterministic links only: the purchase's own
    /// visitor, the checkout session's visitor, and every identity tied
    /// to the same account. Extended mode additionally merges identities
    /// sharing a device fingerprint, subject to the collision and
    /// session-overlap guards.
    pub fn resolve(
        &self,
        purchase: &Purchase,
        mode: MatchingMode,
    ) -> AttributionResult<BTreeSet<String>> {
        let mut resolved = BTreeSet::new();
        resolved.insert(purchase.visitor_id.clone());

        let primary = self.store.identity(&purchase.visitor_id)?;

        // Checkout session link: in-app browsers that dropped cookies on a
        // cross-domain redirect show up as a second visitor on the order.
        let secondary = self.store.resolve_secondary_identity(purchase)?;
        if let Some(ref identity) = secondary {
            resolved.insert(identity.visitor_id.clone());
        }

        // Account link: every identity that logged into the same account.
        let mut account_ids = BTreeSet::new();
        if let Some(ref account_id) = purchase.account_id {
            account_ids.insert(account_id.clone());
        }
        for identity in primary.iter().chain(secondary.iter()) {
            if let Some(ref account_id) = identity.account_id {
                account_ids.insert(account_id.clone());
            }
        }
        let mut linked: Vec<Identity> = Vec::new();
        for account_id in &account_ids {
            linked.extend(self.store.find_by_account(account_id)?);
        }
        for identity in &linked {
            resolved.insert(identity.visitor_id.clone());
        }

        if mode == MatchingMode::Extended {
            // Only the purchaser's own devices seed the fingerprint merge:
            // the primary identity and the checkout session's identity.
            // Fingerprints of account-linked identities stay out, so a
            // shared laptop on the account cannot chain in its other users.
            let seeds: Vec<Identity> = primary.into_iter().chain(secondary).collect();
            self.merge_by_fingerprint(purchase, &seeds, &mut resolved)?;
        }

        debug!(
            order_id = %purchase.order_id,
            mode = %mode,
            identities = resolved.len(),
            "identities resolved"
        );
        Ok(resolved)
    }

    /// Fold in identities that share a device fingerprint with one of
    /// the purchaser's own identities.
    ///
    /// A fingerprint carried by more than `collision_threshold` distinct
    /// identities is too common to mean "same device" and is skipped
    /// wholesale. A candidate whose session activity overlaps the
    /// purchaser's by at least `overlap_guard` is excluded individually.
    fn merge_by_fingerprint(
        &self,
        purchase: &Purchase,
        seeds: &[Identity],
        resolved: &mut BTreeSet<String>,
    ) -> AttributionResult<()> {
        let mut fingerprints = BTreeSet::new();
        for identity in seeds {
            if let Some(ref fingerprint) = identity.fingerprint {
                fingerprints.insert(fingerprint.clone());
            }
        }

        for fingerprint in &fingerprints {
            let cardinality = self.store.fingerprint_cardinality(fingerprint)?;
            if cardinality > self.collision_threshold {
                debug!(
                    order_id = %purchase.order_id,
                    fingerprint = %fingerprint,
                    cardinality,
                    threshold = self.collision_threshold,
                    "fingerprint too common, skipping"
                );
                continue;
            }

            for candidate in self.store.find_by_fingerprint(fingerprint)? {
                if resolved.contains(&candidate.visitor_id) {
                    continue;
                }
                let overlap = self
                    .store
                    .session_overlap(&purchase.visitor_id, &candidate.visitor_id)?;
                if overlap >= self.overlap_guard {
                    debug!(
                        order_id = %purchase.order_id,
                        candidate = %candidate.visitor_id,
                        overlap_secs = overlap.num_seconds(),
                        "concurrent session activity, excluding candidate"
                    );
                    continue;
                }
                resolved.insert(candidate.visitor_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlens_core::types::Identity;
    use adlens_core::InMemoryFactStore;
    use chrono::Utc;

    fn purchase(visitor_id: &str, account_id: Option<&str>, session_id: Option<&str>) -> Purchase {
        Purchase {
            order_id: "ord-1".to_string(),
            visitor_id: visitor_id.to_string(),
            account_id: account_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
            purchased_at: Utc::now(),
            amount: 50_000.0,
        }
    }

    fn resolver(store: Arc<InMemoryFactStore>) -> IdentityResolver {
        IdentityResolver::new(store, 5, Duration::seconds(60))
    }

    #[test]
    fn test_lone_visitor_resolves_to_itself() {
        let store = Arc::new(InMemoryFactStore::new());
        store.upsert_identity(Identity::new("v1"));
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&purchase("v1", None, None), MatchingMode::Strict)
            .unwrap();
        assert_eq!(resolved, BTreeSet::from(["v1".to_string()]));
    }

    #[test]
    fn test_account_link_merges_logged_in_devices() {
        let store = Arc::new(InMemoryFactStore::new());
        store.upsert_identity(Identity::new("v_phone").with_account("acct_1"));
        store.upsert_identity(Identity::new("v_laptop").with_account("acct_1"));
        store.upsert_identity(Identity::new("v_stranger").with_account("acct_2"));
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&purchase("v_phone", Some("acct_1"), None), MatchingMode::Strict)
            .unwrap();
        assert_eq!(
            resolved,
            BTreeSet::from(["v_laptop".to_string(), "v_phone".to_string()])
        );
    }

    #[test]
    fn test_session_link_pulls_in_actual_visitor() {
        let store = Arc::new(InMemoryFactStore::new());
        store.upsert_identity(Identity::new("v_inapp"));
        store.link_session("sess-7", "v_inapp");
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(
                &purchase("v_redirected", None, Some("sess-7")),
                MatchingMode::Strict,
            )
            .unwrap();
        assert!(resolved.contains("v_inapp"));
        assert!(resolved.contains("v_redirected"));
    }

    #[test]
    fn test_extended_mode_merges_fingerprint_matches() {
        let store = Arc::new(InMemoryFactStore::new());
        store.upsert_identity(Identity::new("v1").with_fingerprint("fp_a"));
        store.upsert_identity(Identity::new("v2").with_fingerprint("fp_a"));
        let resolver = resolver(store.clone());

        let strict = resolver
            .resolve(&purchase("v1", None, None), MatchingMode::Strict)
            .unwrap();
        assert_eq!(strict.len(), 1);

        let extended = resolver
            .resolve(&purchase("v1", None, None), MatchingMode::Extended)
            .unwrap();
        assert_eq!(
            extended,
            BTreeSet::from(["v1".to_string(), "v2".to_string()])
        );
    }

    #[test]
    fn test_linked_identity_fingerprints_do_not_chain() {
        let store = Arc::new(InMemoryFactStore::new());
        // Purchaser's phone has no fingerprint; the account-linked laptop
        // does, and a third identity shares it.
        store.upsert_identity(Identity::new("v_phone").with_account("acct_1"));
        store.upsert_identity(
            Identity::new("v_laptop")
                .with_account("acct_1")
                .with_fingerprint("fp_laptop"),
        );
        store.upsert_identity(Identity::new("v_other_user").with_fingerprint("fp_laptop"));
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&purchase("v_phone", Some("acct_1"), None), MatchingMode::Extended)
            .unwrap();
        // The laptop joins through the account; whoever else shares its
        // fingerprint does not.
        assert_eq!(
            resolved,
            BTreeSet::from(["v_laptop".to_string(), "v_phone".to_string()])
        );
    }

    #[test]
    fn test_common_fingerprint_rejected_wholesale() {
        let store = Arc::new(InMemoryFactStore::new());
        // Six identities on one fingerprint: over the threshold of five,
        // so the fingerprint links nothing at all.
        for i in 0..6 {
            store.upsert_identity(Identity::new(format!("v{i}")).with_fingerprint("fp_kiosk"));
        }
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&purchase("v0", None, None), MatchingMode::Extended)
            .unwrap();
        assert_eq!(resolved, BTreeSet::from(["v0".to_string()]));
    }

    #[test]
    fn test_concurrent_sessions_exclude_candidate_only() {
        let store = Arc::new(InMemoryFactStore::new());
        store.upsert_identity(Identity::new("v1").with_fingerprint("fp_shared"));
        store.upsert_identity(Identity::new("v_roommate").with_fingerprint("fp_shared"));
        store.upsert_identity(Identity::new("v_self").with_fingerprint("fp_shared"));
        let t0 = Utc::now();
        // Roommate browsing at the same time as the purchaser: 90s overlap.
        store.record_activity("v1", t0, t0 + Duration::seconds(300));
        store.record_activity("v_roommate", t0 + Duration::seconds(10), t0 + Duration::seconds(100));
        let resolver = resolver(store);

        let resolved = resolver
            .resolve(&purchase("v1", None, None), MatchingMode::Extended)
            .unwrap();
        assert!(!resolved.contains("v_roommate"));
        assert!(resolved.contains("v_self"));
        assert!(resolved.contains("v1"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let store = Arc::new(InMemoryFactStore::new());
        for v in ["v_c", "v_a", "v_b"] {
            store.upsert_identity(Identity::new(v).with_account("acct_9"));
        }
        let resolver = resolver(store);
        let p = purchase("v_b", Some("acct_9"), None);

        let first = resolver.resolve(&p, MatchingMode::Strict).unwrap();
        let second = resolver.resolve(&p, MatchingMode::Strict).unwrap();
        assert_eq!(first, second);
        let ordered: Vec<&String> = first.iter().collect();
        assert_eq!(ordered, vec!["v_a", "v_b", "v_c"]);
    }
}
