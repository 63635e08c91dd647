//! Unified error type for the weather service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("OpenWeatherMap API error: {0}")]
    OpenWeather(String),

    #[error("no weather data available for {city}: upstream fetch failed")]
    UpstreamUnavailable { city: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error means "nothing to serve": the key had no cached
    /// value and the upstream fetch failed too.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable { .. })
    }
}
