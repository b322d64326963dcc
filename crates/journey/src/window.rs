//! Narrows a journey to an attribution window.

use chrono::{DateTime, Utc};

use adlens_core::types::AttributionWindow;

use crate::builder::Journey;

/// Applies a lookback window to a merged journey.
///
/// Two cuts exist on purpose. The credit cut bounds both ends: touches
/// after the purchase never earn revenue, and touches older than the
/// window cutoff have gone stale. The display cut shares the same
/// lower bound but keeps post-purchase touches, so an analyst sees
/// everything the customer clicked in the period. Revenue math never
/// reads the display cut.
///
/// Positions are preserved from the merged journey, not renumbered: a
/// touch that was third in the full path stays third in the windowed
/// view, which keeps credit rows and displayed paths telling the same
/// story.
pub struct AttributionWindowFilter;

impl AttributionWindowFilter {
    /// Touches eligible for revenue credit under the window.
    pub fn for_credit(
        journey: &Journey,
        window: AttributionWindow,
        purchased_at: DateTime<Utc>,
    ) -> Journey {
        let cutoff = window.cutoff(purchased_at);
        let touches = journey
            .touches()
            .iter()
            .filter(|t| t.entered_at <= purchased_at)
            .filter(|t| cutoff.map_or(true, |c| t.entered_at >= c))
            .cloned()
            .collect();
        Journey::from_touches(touches)
    }

    /// Touches shown alongside the purchase: same window cutoff, but
    /// post-purchase clicks stay visible.
    pub fn for_display(
        journey: &Journey,
        window: AttributionWindow,
        purchased_at: DateTime<Utc>,
    ) -> Journey {
        let cutoff = window.cutoff(purchased_at);
        let touches = journey
            .touches()
            .iter()
            .filter(|t| cutoff.map_or(true, |c| t.entered_at >= c))
            .cloned()
            .collect();
        Journey::from_touches(touches)
    }
}
