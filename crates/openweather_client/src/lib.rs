//! OpenWeatherMap API client.
//!
//! Fetches current conditions and the 5-day/3-hour forecast and shapes them
//! into the shared `WeatherReport` format. Implements the `WeatherSource`
//! contract: "no data" is never an error. An unusable key, an unknown city,
//! or a failed call all degrade to deterministic fallback data; `Err` is
//! reserved for failures with nothing sensible to substitute.

mod fallback;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::config::UpstreamConfig;
use common::{
    CurrentConditions, DailyForecast, Error, HourlyForecast, Location, Result, WeatherReport,
    WeatherSource,
};
use serde::Deserialize;
use std::error::Error as _;
use tracing::{debug, info, warn};

pub use fallback::fallback_report;

/// How many 3-hour forecast slots become "hourly" rows.
const HOURLY_SLOTS: usize = 6;
/// Maximum daily rows in a report.
const DAILY_SLOTS: usize = 6;
/// Conversion factor from the API's metric wind speed (m/s) to mph.
const MS_TO_MPH: f64 = 2.237;

/// OpenWeatherMap API client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

// ── Wire types ────────────────────────────────────────────────────────

/// Response from `/weather` (current conditions).
#[derive(Debug, Deserialize)]
pub struct CurrentWeatherResponse {
    pub main: MainMetrics,
    #[serde(default)]
    pub weather: Vec<ConditionInfo>,
    #[serde(default)]
    pub wind: WindInfo,
    pub name: String,
    #[serde(default)]
    pub sys: SysInfo,
}

#[derive(Debug, Deserialize)]
pub struct MainMetrics {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub humidity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionInfo {
    pub main: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindInfo {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub country: String,
}

/// Response from `/forecast` (5 day / 3 hour).
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastSlot>,
    #[serde(default)]
    pub city: ForecastCity,
}

#[derive(Debug, Deserialize)]
pub struct ForecastSlot {
    /// Slot start as a UTC epoch timestamp.
    pub dt: i64,
    pub main: MainMetrics,
    #[serde(default)]
    pub weather: Vec<ConditionInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastCity {
    /// The city's UTC offset in seconds.
    #[serde(default)]
    pub timezone: i64,
}

// ── Client ────────────────────────────────────────────────────────────

impl OpenWeatherClient {
    pub fn new(api_key: String, upstream: &UpstreamConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("weather-service/0.1")
            .pool_max_idle_per_host(4)
            .timeout(std::time::Duration::from_secs(upstream.timeout_secs))
            .build()
            .expect("failed to build OpenWeatherMap HTTP client");

        Self {
            client,
            api_key,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// True when the configured key is worth sending to the API at all.
    /// Placeholder values from setup templates count as unusable.
    pub fn has_usable_key(&self) -> bool {
        api_key_looks_usable(&self.api_key)
    }

    /// Fetch and shape the full report for a city.
    ///
    /// Failure policy, in order: an unusable key or a failed current-weather
    /// call yields the city's full fallback report; a failed forecast call
    /// yields real current conditions with fallback hourly/daily rows.
    pub async fn fetch_report(&self, city: &str) -> Result<WeatherReport> {
        if !self.has_usable_key() {
            warn!(
                "OpenWeatherMap API key missing or unusable, serving fallback data for {}",
                city
            );
            return Ok(fallback::fallback_report(city));
        }

        let current = match self.fetch_current(city).await {
            Ok(current) => current,
            Err(e) => {
                warn!(
                    "Current weather call failed for {} ({}), serving fallback data",
                    city, e
                );
                return Ok(fallback::fallback_report(city));
            }
        };

        match self.fetch_forecast(city).await {
            Ok(forecast) => Ok(build_report(&current, &forecast)),
            Err(e) => {
                warn!(
                    "Forecast call failed for {} ({}), keeping live conditions with fallback forecast rows",
                    city, e
                );
                let substitute = fallback::fallback_report(city);
                Ok(WeatherReport {
                    current: shape_current(&current),
                    location: shape_location(&current),
                    hourly: substitute.hourly,
                    daily: substitute.daily,
                })
            }
        }
    }

    /// Hit the API with a minimal request. Used by the `--check-key` CLI
    /// mode to distinguish a bad key from a merely missing one.
    pub async fn verify_key(&self) -> Result<()> {
        if !self.has_usable_key() {
            return Err(Error::Config(
                "OPENWEATHER_API_KEY is missing or a placeholder".into(),
            ));
        }

        let resp = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", "London"),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        let status = resp.status().as_u16();
        if status == 200 {
            info!("API key accepted by OpenWeatherMap");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if status == 401 {
            return Err(Error::OpenWeather(
                "API key rejected (401) — new keys can take up to 2 hours to activate; \
                 check the key and that your account email is confirmed"
                    .into(),
            ));
        }
        Err(Error::OpenWeather(format!(
            "key check returned {}: {}",
            status,
            summarize_body(&body)
        )))
    }

    async fn fetch_current(&self, city: &str) -> Result<CurrentWeatherResponse> {
        debug!("Fetching current weather for {}", city);

        let resp = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            if status == 404 {
                warn!("City \"{}\" not known to OpenWeatherMap", city);
            }
            return Err(Error::OpenWeather(format!(
                "current weather returned {} for {}: {}",
                status,
                city,
                summarize_body(&body)
            )));
        }

        resp.json::<CurrentWeatherResponse>()
            .await
            .map_err(|e| Error::OpenWeather(format!("current weather JSON for {}: {}", city, e)))
    }

    async fn fetch_forecast(&self, city: &str) -> Result<ForecastResponse> {
        debug!("Fetching forecast for {}", city);

        let resp = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::OpenWeather(format!(
                "forecast returned {} for {}: {}",
                status,
                city,
                summarize_body(&body)
            )));
        }

        resp.json::<ForecastResponse>()
            .await
            .map_err(|e| Error::OpenWeather(format!("forecast JSON for {}: {}", city, e)))
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, city: &str) -> Result<WeatherReport> {
        self.fetch_report(city).await
    }
}

// ── Shaping ───────────────────────────────────────────────────────────

fn build_report(current: &CurrentWeatherResponse, forecast: &ForecastResponse) -> WeatherReport {
    WeatherReport {
        current: shape_current(current),
        location: shape_location(current),
        hourly: shape_hourly(forecast),
        daily: shape_daily(forecast),
    }
}

fn shape_current(current: &CurrentWeatherResponse) -> CurrentConditions {
    let (group, description) = primary_condition(&current.weather);
    CurrentConditions {
        temperature: round(current.main.temp),
        condition: map_condition(&group),
        description,
        humidity: current.main.humidity,
        wind_speed: round(current.wind.speed * MS_TO_MPH),
        feels_like: round(current.main.feels_like),
    }
}

fn shape_location(current: &CurrentWeatherResponse) -> Location {
    Location {
        name: current.name.clone(),
        country: current.sys.country.clone(),
    }
}

/// The first few 3-hour slots double as the "hourly" strip.
fn shape_hourly(forecast: &ForecastResponse) -> Vec<HourlyForecast> {
    let offset_secs = forecast.city.timezone;
    forecast
        .list
        .iter()
        .take(HOURLY_SLOTS)
        .map(|slot| {
            let (group, description) = primary_condition(&slot.weather);
            HourlyForecast {
                time: hour_label(slot.dt, offset_secs),
                temperature: round(slot.main.temp),
                condition: map_condition(&group),
                description,
            }
        })
        .collect()
}

struct DayBucket {
    date: NaiveDate,
    label: String,
    max_temp: f64,
    /// Condition group of the day's first slot.
    group: String,
}

/// Collapse the 3-hour slots into per-day rows: label, daily high, and the
/// condition of the day's first slot. The first row is always "Today".
fn shape_daily(forecast: &ForecastResponse) -> Vec<DailyForecast> {
    let offset_secs = forecast.city.timezone;

    let mut days: Vec<DayBucket> = Vec::new();
    for slot in &forecast.list {
        let date = local_date(slot.dt, offset_secs);
        match days.last_mut() {
            Some(bucket) if bucket.date == date => {
                bucket.max_temp = bucket.max_temp.max(slot.main.temp);
            }
            _ => {
                if days.len() == DAILY_SLOTS {
                    break;
                }
                let (group, _) = primary_condition(&slot.weather);
                days.push(DayBucket {
                    date,
                    label: day_label(slot.dt, offset_secs),
                    max_temp: slot.main.temp,
                    group,
                });
            }
        }
    }

    days.into_iter()
        .enumerate()
        .map(|(i, bucket)| DailyForecast {
            day: if i == 0 {
                "Today".to_string()
            } else {
                bucket.label
            },
            temperature: round(bucket.max_temp),
            condition: map_condition(&bucket.group),
            description: bucket.group,
        })
        .collect()
}

/// Collapse OpenWeatherMap condition groups into the app's vocabulary.
fn map_condition(group: &str) -> String {
    match group {
        "Clear" => "Sunny",
        "Clouds" => "Cloudy",
        "Rain" | "Drizzle" | "Thunderstorm" => "Rainy",
        "Snow" => "Snowy",
        "Mist" | "Fog" | "Haze" => "Mist",
        _ => "Cloudy",
    }
    .to_string()
}

fn primary_condition(weather: &[ConditionInfo]) -> (String, String) {
    weather
        .first()
        .map(|w| (w.main.clone(), w.description.clone()))
        .unwrap_or_else(|| ("Clouds".to_string(), "cloudy".to_string()))
}

fn round(value: f64) -> i64 {
    value.round() as i64
}

/// Display label like "1 PM" for a slot, in the city's local time.
fn hour_label(dt: i64, offset_secs: i64) -> String {
    shifted_time(dt, offset_secs).format("%-I %p").to_string()
}

/// Short weekday label like "Tue", in the city's local time.
fn day_label(dt: i64, offset_secs: i64) -> String {
    shifted_time(dt, offset_secs).format("%a").to_string()
}

fn local_date(dt: i64, offset_secs: i64) -> NaiveDate {
    shifted_time(dt, offset_secs).date_naive()
}

fn shifted_time(dt: i64, offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(dt + offset_secs, 0).unwrap_or_default()
}

fn api_key_looks_usable(key: &str) -> bool {
    key.len() >= 10 && key != "your_api_key_here" && key != "demo_key"
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace('\n', " ").replace('\r', " ");
    if compact.len() > MAX_CHARS {
        // Error bodies can be multibyte UTF-8; cut on a char boundary.
        let mut cut = MAX_CHARS;
        while !compact.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &compact[..cut])
    } else {
        compact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_current() -> &'static str {
        r#"{
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {"temp": 16.4, "feels_like": 15.9, "temp_min": 14.8, "temp_max": 17.6, "pressure": 1012, "humidity": 72},
            "wind": {"speed": 4.1, "deg": 80},
            "sys": {"country": "GB", "sunrise": 1756097000, "sunset": 1756147000},
            "name": "London"
        }"#
    }

    fn sample_forecast() -> &'static str {
        r#"{
            "list": [
                {"dt": 1756123200, "main": {"temp": 18.2, "feels_like": 17.8, "humidity": 60}, "weather": [{"main": "Clouds", "description": "scattered clouds"}]},
                {"dt": 1756134000, "main": {"temp": 21.7, "feels_like": 21.0, "humidity": 55}, "weather": [{"main": "Clear", "description": "clear sky"}]},
                {"dt": 1756144800, "main": {"temp": 19.0, "feels_like": 18.7, "humidity": 64}, "weather": [{"main": "Rain", "description": "light rain"}]},
                {"dt": 1756209600, "main": {"temp": 24.3, "feels_like": 23.9, "humidity": 50}, "weather": [{"main": "Clear", "description": "clear sky"}]},
                {"dt": 1756220400, "main": {"temp": 22.1, "feels_like": 21.6, "humidity": 57}, "weather": [{"main": "Clouds", "description": "few clouds"}]}
            ],
            "city": {"timezone": 3600}
        }"#
    }

    #[test]
    fn test_deserialize_current_response() {
        let parsed: CurrentWeatherResponse =
            serde_json::from_str(sample_current()).expect("current response should deserialize");

        assert_eq!(parsed.name, "London");
        assert_eq!(parsed.sys.country, "GB");
        assert_eq!(parsed.main.humidity, 72);
        assert!((parsed.wind.speed - 4.1).abs() < 1e-9);
    }

    #[test]
    fn test_shape_current_rounds_and_converts_wind() {
        let parsed: CurrentWeatherResponse =
            serde_json::from_str(sample_current()).expect("current response should deserialize");

        let current = shape_current(&parsed);
        assert_eq!(current.temperature, 16);
        assert_eq!(current.feels_like, 16);
        assert_eq!(current.condition, "Rainy");
        assert_eq!(current.description, "light rain");
        // 4.1 m/s * 2.237 = 9.17 mph, rounded.
        assert_eq!(current.wind_speed, 9);
    }

    #[test]
    fn test_shape_hourly_labels_local_time() {
        let parsed: ForecastResponse =
            serde_json::from_str(sample_forecast()).expect("forecast response should deserialize");

        let hourly = shape_hourly(&parsed);
        assert_eq!(hourly.len(), 5, "five slots in, five rows out");

        // 1756123200 is 12:00 UTC; the +3600s offset makes it 1 PM local.
        assert_eq!(hourly[0].time, "1 PM");
        assert_eq!(hourly[1].time, "4 PM");
        assert_eq!(hourly[2].time, "7 PM");
        assert_eq!(hourly[0].temperature, 18);
        assert_eq!(hourly[1].temperature, 22);
        assert_eq!(hourly[1].condition, "Sunny");
        assert_eq!(hourly[2].condition, "Rainy");
    }

    #[test]
    fn test_shape_daily_groups_by_local_day() {
        let parsed: ForecastResponse =
            serde_json::from_str(sample_forecast()).expect("forecast response should deserialize");

        let daily = shape_daily(&parsed);
        assert_eq!(daily.len(), 2);

        assert_eq!(daily[0].day, "Today");
        assert_eq!(daily[0].temperature, 22, "daily high is the max slot temp");
        assert_eq!(daily[0].condition, "Cloudy", "condition from first slot");
        assert_eq!(daily[0].description, "Clouds");

        assert_eq!(daily[1].day, "Tue");
        assert_eq!(daily[1].temperature, 24);
        assert_eq!(daily[1].condition, "Sunny");
    }

    #[test]
    fn test_hour_label_handles_negative_offsets() {
        // 12:00 UTC with New York's -4h offset is 8 AM local.
        assert_eq!(hour_label(1756123200, -14400), "8 AM");
    }

    #[test]
    fn test_condition_mapping_vocabulary() {
        assert_eq!(map_condition("Clear"), "Sunny");
        assert_eq!(map_condition("Clouds"), "Cloudy");
        assert_eq!(map_condition("Rain"), "Rainy");
        assert_eq!(map_condition("Drizzle"), "Rainy");
        assert_eq!(map_condition("Thunderstorm"), "Rainy");
        assert_eq!(map_condition("Snow"), "Snowy");
        assert_eq!(map_condition("Mist"), "Mist");
        assert_eq!(map_condition("Fog"), "Mist");
        assert_eq!(map_condition("Haze"), "Mist");
        assert_eq!(map_condition("Tornado"), "Cloudy", "unknown groups default");
    }

    #[test]
    fn test_api_key_screening() {
        assert!(!api_key_looks_usable(""));
        assert!(!api_key_looks_usable("short"));
        assert!(!api_key_looks_usable("demo_key"));
        assert!(!api_key_looks_usable("your_api_key_here"));
        assert!(api_key_looks_usable("0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn test_forecast_parses_without_optional_fields() {
        let parsed: ForecastResponse =
            serde_json::from_str(r#"{"list": [{"dt": 1756123200, "main": {"temp": 10.0}}]}"#)
                .expect("sparse forecast should deserialize");

        assert_eq!(parsed.city.timezone, 0);
        let hourly = shape_hourly(&parsed);
        assert_eq!(hourly[0].condition, "Cloudy", "missing weather defaults");
        assert_eq!(hourly[0].time, "12 PM");
    }

    #[test]
    fn test_body_summary_cuts_on_char_boundary() {
        // 499 ASCII bytes put the two-byte 'é' astride the 500-byte cut.
        let body = format!("{}é trailing detail", "a".repeat(499));
        let summary = summarize_body(&body);
        assert!(summary.starts_with(&"a".repeat(499)));
        assert!(summary.ends_with('…'));
        assert!(!summary.contains('é'), "char astride the cut is dropped whole");

        let ascii = summarize_body(&"x".repeat(600));
        assert_eq!(ascii.chars().filter(|c| *c == 'x').count(), 500);
        assert!(ascii.ends_with('…'));

        let short = "déjà vu, 40°";
        assert_eq!(summarize_body(short), short, "short bodies pass through untouched");
    }
}
