//! Domain types for touchpoint attribution.
//!
//! Everything here is a plain value: touchpoints and purchases are
//! immutable facts, and the enums describing window, matching mode, and
//! weighting model all validate at construction so bad configuration is
//! rejected before any computation runs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttributionError;

// ─── Ad Key ─────────────────────────────────────────────────────────────

/// The unit of attribution credit.
///
/// Identity is structural over `(ad_ident, source, medium, campaign)`:
/// `ad_ident` holds the platform-assigned ad id when one exists, or the
/// free-text creative label for platforms without stable ids. The
/// human-facing `creative` label is carried for display but two keys with
/// the same ident and dimensions are the same ad no matter how the label
/// was re-rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdKey {
    pub ad_ident: String,
    pub creative: String,
    pub source: String,
    pub medium: String,
    pub campaign: String,
}

impl AdKey {
    /// Key for an ad with a stable platform-assigned identifier.
    pub fn with_ad_id(
        ad_id: impl Into<String>,
        creative: impl Into<String>,
        source: impl Into<String>,
        medium: impl Into<String>,
        campaign: impl Into<String>,
    ) -> Self {
        Self {
            ad_ident: ad_id.into(),
            creative: creative.into(),
            source: source.into(),
            medium: medium.into(),
            campaign: campaign.into(),
        }
    }

    /// Fallback key for platforms without ad ids: the creative label
    /// itself becomes the identity.
    pub fn from_creative(
        creative: impl Into<String>,
        source: impl Into<String>,
        medium: impl Into<String>,
        campaign: impl Into<String>,
    ) -> Self {
        let creative = creative.into();
        Self {
            ad_ident: creative.clone(),
            creative,
            source: source.into(),
            medium: medium.into(),
            campaign: campaign.into(),
        }
    }

    fn identity_tuple(&self) -> (&str, &str, &str, &str) {
        (&self.ad_ident, &self.source, &self.medium, &self.campaign)
    }
}

impl PartialEq for AdKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity_tuple() == other.identity_tuple()
    }
}

impl Eq for AdKey {}

impl Hash for AdKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_tuple().hash(state);
    }
}

impl PartialOrd for AdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_tuple().cmp(&other.identity_tuple())
    }
}

impl fmt::Display for AdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}/{}]",
            self.creative, self.source, self.medium, self.campaign
        )
    }
}

// ─── Facts ──────────────────────────────────────────────────────────────

/// A tracking identity: one browser/device profile as recorded by the
/// collection layer. The account id is filled in on login and the
/// fingerprint on repeat visits; both may stay empty forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub visitor_id: String,
    pub account_id: Option<String>,
    pub fingerprint: Option<String>,
    /// Network/device signature kept for display and debugging. Never used
    /// for linking: shared networks made it merge different people.
    pub network_signature: Option<String>,
}

impl Identity {
    pub fn new(visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            account_id: None,
            fingerprint: None,
            network_signature: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_network_signature(mut self, signature: impl Into<String>) -> Self {
        self.network_signature = Some(signature.into());
        self
    }
}

/// One exposure of a visitor to an ad. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Touchpoint {
    pub visitor_id: String,
    pub ad_key: AdKey,
    pub entered_at: DateTime<Utc>,
    /// Index within the owning visitor's own timeline. Only meaningful
    /// per-visitor; journeys re-derive positions after merging.
    pub sequence: u32,
    /// Dwell time of the session this touch opened, in seconds. Feeds the
    /// duration-weighted model; zero when the session never closed cleanly.
    pub duration_secs: u32,
}

/// A completed, paid, non-cancelled order. The ingestion layer guarantees
/// cancelled/refunded and non-positive orders never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub order_id: String,
    pub visitor_id: String,
    pub account_id: Option<String>,
    /// Checkout session, when the tracker captured one. Follows the
    /// session-to-identity link for in-app browsers that dropped cookies
    /// across a cross-domain redirect.
    pub session_id: Option<String>,
    pub purchased_at: DateTime<Utc>,
    /// Net revenue.
    pub amount: f64,
}

/// Inclusive timestamp range, matching how reporting periods are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

// ─── Attribution parameters ─────────────────────────────────────────────

/// Lookback window before a purchase within which touchpoints may receive
/// credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionWindow {
    Days30,
    Days60,
    Days90,
    Unbounded,
}

impl AttributionWindow {
    /// Validate a day count from configuration. `None` means unbounded;
    /// anything other than 30/60/90 is rejected up front.
    pub fn from_days(days: Option<u32>) -> Result<Self, AttributionError> {
        match days {
            None => Ok(Self::Unbounded),
            Some(30) => Ok(Self::Days30),
            Some(60) => Ok(Self::Days60),
            Some(90) => Ok(Self::Days90),
            Some(other) => Err(AttributionError::InvalidWindow(other)),
        }
    }

    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Days30 => Some(30),
            Self::Days60 => Some(60),
            Self::Days90 => Some(90),
            Self::Unbounded => None,
        }
    }

    /// Earliest instant still inside the window for the given purchase,
    /// or `None` when unbounded.
    pub fn cutoff(&self, purchased_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days()
            .map(|d| purchased_at - Duration::days(i64::from(d)))
    }
}

impl fmt::Display for AttributionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.days() {
            Some(d) => write!(f, "{d}d"),
            None => write!(f, "unbounded"),
        }
    }
}

/// How aggressively identities are merged into one journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Primary identity + session link + linked account only.
    Strict,
    /// Additionally merge identities sharing the device fingerprint,
    /// subject to the collision and overlap guards.
    Extended,
}

impl FromStr for MatchingMode {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "extended" => Ok(Self::Extended),
            other => Err(AttributionError::InvalidMatchingMode(other.to_string())),
        }
    }
}

impl fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

/// Generic position-based weighting models for campaign-level reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightModel {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    DurationWeighted,
}

impl FromStr for WeightModel {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_touch" => Ok(Self::FirstTouch),
            "last_touch" => Ok(Self::LastTouch),
            "linear" => Ok(Self::Linear),
            "time_decay" => Ok(Self::TimeDecay),
            "duration_weighted" => Ok(Self::DurationWeighted),
            other => Err(AttributionError::InvalidModel(other.to_string())),
        }
    }
}

impl fmt::Display for WeightModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FirstTouch => "first_touch",
            Self::LastTouch => "last_touch",
            Self::Linear => "linear",
            Self::TimeDecay => "time_decay",
            Self::DurationWeighted => "duration_weighted",
        };
        write!(f, "{name}")
    }
}

/// Role of an ad within one purchase's credited journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchRole {
    /// Only distinct ad in the journey: full credit.
    LastTouchPure,
    /// Most recent of several distinct ads: half credit.
    LastTouchAssisted,
    /// Seen earlier in the journey: shares the assist half.
    Assist,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ad_key_identity_ignores_creative_label() {
        let a = AdKey::with_ad_id("ad-1", "Summer Sale v1", "meta", "cpc", "summer");
        let b = AdKey::with_ad_id("ad-1", "Summer Sale v2 (renamed)", "meta", "cpc", "summer");
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let hash = |k: &AdKey| {
            let mut h = DefaultHasher::new();
            k.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_ad_key_creative_fallback_distinguishes_dimensions() {
        let a = AdKey::from_creative("carousel_01", "meta", "cpc", "summer");
        let b = AdKey::from_creative("carousel_01", "naver", "cpc", "summer");
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_window_from_days_validation() {
        assert_eq!(
            AttributionWindow::from_days(Some(30)).unwrap(),
            AttributionWindow::Days30
        );
        assert_eq!(
            AttributionWindow::from_days(None).unwrap(),
            AttributionWindow::Unbounded
        );
        assert!(matches!(
            AttributionWindow::from_days(Some(45)),
            Err(AttributionError::InvalidWindow(45))
        ));
    }

    #[test]
    fn test_window_cutoff() {
        let purchased_at = Utc::now();
        let cutoff = AttributionWindow::Days30.cutoff(purchased_at).unwrap();
        assert_eq!(purchased_at - cutoff, Duration::days(30));
        assert!(AttributionWindow::Unbounded.cutoff(purchased_at).is_none());
    }

    #[test]
    fn test_model_and_mode_parsing() {
        assert_eq!("time_decay".parse::<WeightModel>().unwrap(), WeightModel::TimeDecay);
        assert!(matches!(
            "w_shaped".parse::<WeightModel>(),
            Err(AttributionError::InvalidModel(_))
        ));
        assert_eq!("extended".parse::<MatchingMode>().unwrap(), MatchingMode::Extended);
        assert!("loose".parse::<MatchingMode>().is_err());
    }
}
