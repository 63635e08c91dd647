//! HTTP surface — the weather and health endpoints, served over axum.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::config::ServiceConfig;
use common::{Error, Result, WeatherReport};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use weather_cache::WeatherCache;

/// Shared state handed to every request handler.
pub struct AppState {
    pub cache: WeatherCache,
    pub config: ServiceConfig,
    pub started_at: Instant,
}

#[derive(Debug, Deserialize)]
struct WeatherQuery {
    city: Option<String>,
}

/// Success envelope for `GET /api/weather`.
#[derive(Debug, Serialize)]
struct WeatherEnvelope {
    success: bool,
    data: WeatherReport,
    cached: bool,
    timestamp: DateTime<Utc>,
}

/// Error envelope returned when no data could be produced at all.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    timestamp: DateTime<Utc>,
}

/// Response for `GET /api/health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    cache: Vec<CacheEntrySummary>,
    uptime_secs: u64,
    port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntrySummary {
    city: String,
    last_updated: DateTime<Utc>,
    age: String,
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/weather", get(get_weather))
        .route("/health", get(get_health))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new().nest("/api", api_routes()).with_state(state)
}

/// Serve the API until the `shutdown` future resolves.
pub async fn run<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))?;

    let app = create_router(Arc::clone(&state));

    let listener = TcpListener::bind(addr).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::AddrInUse => Error::Config(format!(
            "Failed to bind to {}: address already in use (is another weather-service running?)",
            addr
        )),
        std::io::ErrorKind::PermissionDenied => Error::Config(format!(
            "Failed to bind to {}: permission denied (ports below 1024 need elevated privileges)",
            addr
        )),
        _ => Error::Io(e),
    })?;

    info!("✅ Listening on http://{}", addr);
    info!("📊 Weather API available at http://{}/api/weather", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::Io)?;

    info!("HTTP server stopped");
    Ok(())
}

fn resolve_city<'a>(requested: Option<&'a str>, default_city: &'a str) -> &'a str {
    requested
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .unwrap_or(default_city)
}

fn format_age(age_secs: i64) -> String {
    format!("{}s ago", age_secs.max(0))
}

/// GET /api/weather?city=NAME
async fn get_weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Response {
    let city = resolve_city(query.city.as_deref(), &state.config.default_city);
    debug!("Weather request for {}", city);

    match state.cache.get(city).await {
        Ok(report) => Json(WeatherEnvelope {
            success: true,
            data: report,
            cached: true,
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(e) => {
            // Upstream detail stays in the logs; clients get a stable message.
            error!("Weather request for {} failed: {}", city, e);
            let body = Json(ErrorEnvelope {
                success: false,
                error: "Failed to fetch weather data".to_string(),
                timestamp: Utc::now(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

/// GET /api/health
async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache = state
        .cache
        .status()
        .await
        .into_iter()
        .map(|entry| CacheEntrySummary {
            city: entry.city,
            last_updated: entry.last_updated,
            age: format_age(entry.age_secs),
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        cache,
        uptime_secs: state.started_at.elapsed().as_secs(),
        port: state.config.port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{CurrentConditions, Location};

    fn sample_report() -> WeatherReport {
        WeatherReport {
            current: CurrentConditions {
                temperature: 15,
                condition: "Cloudy".into(),
                description: "overcast clouds".into(),
                humidity: 65,
                wind_speed: 8,
                feels_like: 13,
            },
            location: Location {
                name: "London".into(),
                country: "GB".into(),
            },
            hourly: Vec::new(),
            daily: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_city_falls_back_to_default() {
        assert_eq!(resolve_city(None, "London"), "London");
        assert_eq!(resolve_city(Some("   "), "London"), "London");
        assert_eq!(resolve_city(Some(" Paris "), "London"), "Paris");
    }

    #[test]
    fn test_age_formatting_clamps_negative_ages() {
        assert_eq!(format_age(42), "42s ago");
        assert_eq!(format_age(0), "0s ago");
        assert_eq!(format_age(-3), "0s ago", "clock skew must not leak");
    }

    #[test]
    fn test_weather_envelope_shape() {
        let envelope = WeatherEnvelope {
            success: true,
            data: sample_report(),
            cached: true,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&envelope).expect("envelope should serialize");

        assert_eq!(value["success"], true);
        assert_eq!(value["cached"], true);
        assert_eq!(value["data"]["location"]["name"], "London");
        assert_eq!(
            value["data"]["current"]["windSpeed"], 8,
            "report fields stay camelCase on the wire"
        );
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_error_envelope_hides_upstream_detail() {
        let envelope = ErrorEnvelope {
            success: false,
            error: "Failed to fetch weather data".to_string(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&envelope).expect("envelope should serialize");

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Failed to fetch weather data");
    }

    #[test]
    fn test_health_payload_uses_wire_field_names() {
        let payload = HealthResponse {
            status: "healthy".into(),
            timestamp: Utc::now(),
            cache: vec![CacheEntrySummary {
                city: "london".into(),
                last_updated: Utc::now(),
                age: format_age(42),
            }],
            uptime_secs: 7,
            port: 3023,
        };
        let value = serde_json::to_value(&payload).expect("payload should serialize");

        assert_eq!(value["status"], "healthy");
        assert_eq!(value["uptimeSecs"], 7);
        assert_eq!(value["port"], 3023);
        assert_eq!(value["cache"][0]["age"], "42s ago");
        assert!(
            value["cache"][0].get("lastUpdated").is_some(),
            "cache entries use camelCase keys"
        );
    }
}
