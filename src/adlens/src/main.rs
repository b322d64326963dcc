//! AdLens — multi-touch revenue attribution for ad campaigns.
//!
//! Entry point that wires the fact store, identity resolver, and
//! reporting pipeline, then prints a creative report and a model
//! comparison over the demo dataset.

use adlens_core::config::AppConfig;
use adlens_core::types::{AttributionWindow, TimeRange, WeightModel};
use adlens_core::InMemoryFactStore;
use adlens_reporting::AttributionPipeline;
use chrono::{Duration, Utc};
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "adlens")]
#[command(about = "Multi-touch revenue attribution for ad campaigns")]
#[command(version)]
struct Cli {
    /// Attribution window in days: 30, 60, or 90 (overrides config)
    #[arg(long, env = "ADLENS__ATTRIBUTION__WINDOW_DAYS")]
    window_days: Option<u32>,

    /// Use an unbounded lookback window
    #[arg(long, default_value_t = false, conflicts_with = "window_days")]
    unbounded: bool,

    /// Identity matching mode: strict or extended (overrides config)
    #[arg(long, env = "ADLENS__ATTRIBUTION__MATCHING_MODE")]
    mode: Option<String>,

    /// Weighting model for the comparison report
    #[arg(long, default_value = "linear")]
    model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adlens=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("AdLens starting up");

    // Load configuration; a malformed environment is a startup failure.
    let mut config = AppConfig::load()?;

    // Apply CLI overrides
    if cli.unbounded {
        config.attribution.window_days = None;
    } else if let Some(days) = cli.window_days {
        config.attribution.window_days = Some(days);
    }
    if let Some(mode) = cli.mode {
        config.attribution.matching_mode = FromStr::from_str(&mode)?;
    }
    let window = AttributionWindow::from_days(config.attribution.window_days)?;
    let mode = config.attribution.matching_mode;
    let model = WeightModel::from_str(&cli.model)?;

    info!(
        window = %window,
        mode = %mode,
        model = %model,
        max_concurrency = config.runtime.max_concurrency,
        "Configuration loaded"
    );

    // Seed the in-memory store with the demo dataset
    let store = Arc::new(InMemoryFactStore::new());
    store.seed_demo_data();

    let pipeline = AttributionPipeline::from_config(store, &config);

    let now = Utc::now();
    let period = TimeRange::new(now - Duration::days(90), now);

    let creative = pipeline.creative_report(period, window, mode).await?;
    println!("{}", serde_json::to_string_pretty(&creative)?);

    let comparison = pipeline.model_report(period, window, mode, model).await?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);

    info!(
        creative_rows = creative.rows.len(),
        model_rows = comparison.rows.len(),
        "reports written"
    );
    Ok(())
}
