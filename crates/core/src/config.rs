use serde::Deserialize;

use crate::error::{AttributionError, AttributionResult};
use crate::types::MatchingMode;

/// Root application configuration. Loaded from environment variables with
/// the prefix `ADLENS__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    /// Lookback window in days; `None` means unbounded. Validated against
    /// the supported set (30/60/90) when a report is requested.
    #[serde(default = "default_window_days")]
    pub window_days: Option<u32>,
    #[serde(default = "default_matching_mode")]
    pub matching_mode: MatchingMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Fingerprints shared by more than this many identities are too
    /// common to be a trustworthy link (shared browser images, default
    /// device configs) and are ignored wholesale.
    #[serde(default = "default_collision_threshold")]
    pub fingerprint_collision_threshold: usize,
    /// Candidates whose session activity overlaps the purchaser's by at
    /// least this many seconds are two different people on one device.
    #[serde(default = "default_overlap_guard_secs")]
    pub session_overlap_guard_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently attributed purchases; size this to the
    /// backing store's connection limit.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_window_days() -> Option<u32> {
    Some(30)
}

fn default_matching_mode() -> MatchingMode {
    MatchingMode::Strict
}

fn default_collision_threshold() -> usize {
    5
}

fn default_overlap_guard_secs() -> i64 {
    60
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            matching_mode: default_matching_mode(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            fingerprint_collision_threshold: default_collision_threshold(),
            session_overlap_guard_secs: default_overlap_guard_secs(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables. A malformed value
    /// is a hard error; callers decide nothing on a half-read config.
    pub fn load() -> AttributionResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADLENS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AttributionError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| AttributionError::Config(e.to_string()))
    }
}
