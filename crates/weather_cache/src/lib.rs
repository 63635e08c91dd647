//! Self-refreshing weather cache.
//!
//! Serves cached reports while they are inside the freshness window,
//! fetches synchronously when a city is cold or stale, and keeps every
//! requested city warm with a per-city background refresh task on the
//! same cadence.

mod store;

pub use store::{CityStatus, WeatherCache};
