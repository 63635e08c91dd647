//! Domain types shared across the service.

use serde::{Deserialize, Serialize};

/// A complete weather report for one location: current conditions plus
/// short-range hourly and daily forecasts.
///
/// Field names serialize in camelCase so API responses keep the shape the
/// frontend already consumes (`windSpeed`, `feelsLike`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub location: Location,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

/// Current observed conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    /// Rounded temperature in °C.
    pub temperature: i64,
    /// Simplified condition label ("Sunny", "Cloudy", "Rainy", ...).
    pub condition: String,
    /// Free-form description from the provider ("light rain").
    pub description: String,
    /// Relative humidity in percent.
    pub humidity: i64,
    /// Rounded wind speed in mph.
    pub wind_speed: i64,
    /// Rounded apparent temperature in °C.
    pub feels_like: i64,
}

/// Resolved location for a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// ISO country code ("GB").
    pub country: String,
}

/// One hourly forecast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// Display label like "1 PM".
    pub time: String,
    pub temperature: i64,
    pub condition: String,
    pub description: String,
}

/// One daily forecast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Display label: "Today", then short weekdays ("Tue").
    pub day: String,
    /// Rounded daily high in °C.
    pub temperature: i64,
    pub condition: String,
    pub description: String,
}
