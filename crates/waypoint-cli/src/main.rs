//! Waypoint CLI.
//!
//! Loads settings, registers the toolset, runs one planning request, and
//! prints the itinerary as JSON.  `--offline` swaps the provider tools for
//! deterministic stubs so the pipeline can be exercised without API keys
//! (the model endpoint is still required).

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use waypoint_adapters::{provider_toolset, stub_toolset};
use waypoint_agent::{
    AccommodationTier, AgentRunner, HttpModelClient, Settings, TripPlanner, TripRequest,
};
use waypoint_kernel::{ToolInvoker, ToolRegistry};

/// Plan a multi-day trip with cooperating reasoning agents.
#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about)]
struct Cli {
    /// Destination city.
    destination: String,

    /// Trip length in days.
    #[arg(long, default_value_t = 3)]
    days: u32,

    /// First day of the trip (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    start_date: Option<chrono::NaiveDate>,

    /// Accommodation tier: economy, comfort, or luxury.
    #[arg(long, default_value = "comfort")]
    tier: AccommodationTier,

    /// Comma-separated preference tags, e.g. "history,food".
    #[arg(long, value_delimiter = ',')]
    prefs: Vec<String>,

    /// Use deterministic stub tools instead of live providers.
    #[arg(long)]
    offline: bool,

    /// Pretty-print the resulting itinerary.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    if settings.llm_api_key.is_empty() {
        bail!("LLM_API_KEY is not set; the planner needs a model endpoint");
    }

    let request = TripRequest::new(
        cli.destination,
        cli.start_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        cli.days,
        cli.tier,
        cli.prefs,
    )
    .context("invalid trip request")?;

    // Populate the registry once, before any planning activity.
    let registry = Arc::new(ToolRegistry::new());
    let specs = if cli.offline {
        stub_toolset()
    } else {
        let amap_key = settings
            .amap_api_key
            .as_deref()
            .context("AMAP_API_KEY is not set (or pass --offline)")?;
        provider_toolset(
            amap_key,
            settings.unsplash_access_key.as_deref(),
            settings.cache_poi_ttl,
            settings.cache_weather_ttl,
        )?
    };
    for spec in specs {
        registry.register(spec)?;
    }
    tracing::info!(tools = registry.count(), offline = cli.offline, "toolset registered");

    let invoker = Arc::new(ToolInvoker::new(
        Arc::clone(&registry),
        settings.invoker_config(),
    ));
    let llm = Arc::new(HttpModelClient::new(settings.llm_config())?);
    let runner = AgentRunner::new(llm, invoker, settings.loop_config());
    let planner = TripPlanner::new(runner);

    let plan = planner.plan(&request).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&plan)?
    } else {
        serde_json::to_string(&plan)?
    };
    println!("{rendered}");

    Ok(())
}
