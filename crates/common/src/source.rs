//! Upstream data source seam.

use crate::types::WeatherReport;
use crate::Result;
use async_trait::async_trait;

/// Provider of weather reports, keyed by normalized (lowercase) city name.
///
/// Implementations own their failure policy: "no data for this city" is not
/// an error — they substitute best-effort fallback values and still return a
/// report. `Err` is reserved for total failure, and the cache layer decides
/// what to do with it (serve stale, or surface `UpstreamUnavailable`).
///
/// Fetches must be idempotent; the cache retries them freely on its refresh
/// cadence.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<WeatherReport>;
}
