//! Weather-service: self-refreshing OpenWeatherMap cache with an HTTP API.
//!
//! Single-binary Tokio application that:
//! 1. Serves current conditions and forecasts over HTTP
//! 2. Caches per-city reports and serves them while they are fresh
//! 3. Keeps every tracked city refreshed in the background
//! 4. Falls back to canned data when the upstream is unreachable

mod config;
mod server;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use clap::Parser;
use tracing::{error, info, warn};

use openweather_client::OpenWeatherClient;
use weather_cache::WeatherCache;

/// Self-refreshing weather cache service
#[derive(Parser)]
#[command(name = "weather-service", about = "Self-refreshing OpenWeatherMap cache service")]
struct Cli {
    /// Just validate the OpenWeatherMap API key, then exit.
    #[arg(long)]
    check_key: bool,

    /// Fetch weather for one city, print it as JSON, and exit.
    #[arg(long, value_name = "CITY")]
    fetch: Option<String>,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "weather_service=info,weather_cache=info,openweather_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🌤️  Weather Service starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = OpenWeatherClient::new(cfg.api_key.clone(), &cfg.upstream);
    if client.has_usable_key() {
        info!("Mode: live OpenWeatherMap data");
    } else {
        warn!("Mode: fallback-only (set OPENWEATHER_API_KEY for live data)");
    }
    info!("Default city: {}", cfg.default_city);
    info!(
        "Cache freshness window: {}s (background refresh interval)",
        cfg.cache.ttl_secs
    );
    info!("Bind address: {}:{}", cfg.host, cfg.port);

    // ── Check-key mode ───────────────────────────────────────────────
    if cli.check_key {
        info!("Validating OpenWeatherMap API key...");
        match client.verify_key().await {
            Ok(()) => {
                info!("✅ API key is valid");
            }
            Err(e) => {
                error!("❌ API key check failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let cache = WeatherCache::new(Arc::new(client), Duration::from_secs(cfg.cache.ttl_secs));

    // ── Fetch-once mode ──────────────────────────────────────────────
    if let Some(city) = cli.fetch {
        info!("Fetching weather for {}...", city);
        match cache.get(&city).await {
            Ok(report) => {
                let rendered =
                    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", rendered);
                info!("✅ Fetched weather for {}", report.location.name);
            }
            Err(e) => {
                error!("❌ Fetch failed: {}", e);
                cache.shutdown().await;
                std::process::exit(1);
            }
        }
        cache.shutdown().await;
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    info!("Spawning tasks...");

    // Task 1: HTTP server
    let server_state = Arc::new(server::AppState {
        cache: cache.clone(),
        config: cfg.clone(),
        started_at: Instant::now(),
    });
    let server_handle = tokio::spawn(server::run(server_state, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    // Task 2: Heartbeat
    let hb_cache = cache.clone();
    let hb_ttl = cfg.cache.ttl_secs;
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let status = hb_cache.status().await;
            let oldest_age = status.iter().map(|s| s.age_secs).max().unwrap_or(0);
            info!(
                "HEARTBEAT: cities={} oldest_age={}s ttl={}s",
                status.len(),
                oldest_age,
                hb_ttl
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!(
        "🚀 Weather Service is running on http://{}:{}. Press Ctrl+C to stop.",
        cfg.host, cfg.port
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = server_handle => {
            match r {
                Ok(Err(e)) => error!("HTTP server exited: {}", e),
                other => error!("HTTP server task exited: {:?}", other),
            }
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    cache.shutdown().await;
    info!("Weather Service shut down.");
}
