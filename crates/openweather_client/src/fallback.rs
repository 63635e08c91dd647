//! Deterministic fallback weather data.
//!
//! Served whenever the upstream API cannot be used — missing key, network
//! failure, unknown city — so the service keeps answering with plausible
//! numbers instead of failing.

use common::{CurrentConditions, DailyForecast, HourlyForecast, Location, WeatherReport};

/// Reference temperature (°C) and country per city. Matched
/// case-insensitively; cities not listed get a mild London-like default.
const CITY_TABLE: &[(&str, i64, &str)] = &[
    ("London", 15, "GB"),
    ("Manchester", 13, "GB"),
    ("Birmingham", 14, "GB"),
    ("Edinburgh", 11, "GB"),
    ("Cardiff", 16, "GB"),
    ("Bristol", 15, "GB"),
    ("Liverpool", 13, "GB"),
    ("Glasgow", 10, "GB"),
    ("Multan", 32, "PK"),
    ("New York", 18, "US"),
    ("Paris", 16, "FR"),
    ("Tokyo", 22, "JP"),
];

const DEFAULT_TEMP: i64 = 15;
const DEFAULT_COUNTRY: &str = "GB";

/// Build a complete fallback report for a city.
pub fn fallback_report(city: &str) -> WeatherReport {
    let (temp, country) = CITY_TABLE
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(city))
        .map(|(_, temp, country)| (*temp, *country))
        .unwrap_or((DEFAULT_TEMP, DEFAULT_COUNTRY));

    WeatherReport {
        current: CurrentConditions {
            temperature: temp,
            condition: "Cloudy".into(),
            description: "Partly cloudy".into(),
            humidity: 65,
            wind_speed: 8,
            feels_like: temp - 2,
        },
        location: Location {
            name: display_name(city),
            country: country.to_string(),
        },
        hourly: vec![
            hourly("1 PM", temp, "Cloudy"),
            hourly("2 PM", temp + 1, "Sunny"),
            hourly("3 PM", temp + 2, "Sunny"),
            hourly("4 PM", temp + 1, "Cloudy"),
            hourly("5 PM", temp, "Cloudy"),
            hourly("6 PM", temp - 1, "Cloudy"),
        ],
        daily: vec![
            daily("Today", temp, "Cloudy"),
            daily("Tue", temp + 3, "Sunny"),
            daily("Wed", temp - 2, "Rainy"),
            daily("Thu", temp + 1, "Cloudy"),
            daily("Fri", temp + 2, "Sunny"),
            daily("Sat", temp, "Cloudy"),
        ],
    }
}

fn hourly(time: &str, temperature: i64, condition: &str) -> HourlyForecast {
    HourlyForecast {
        time: time.to_string(),
        temperature,
        condition: condition.to_string(),
        description: condition.to_string(),
    }
}

fn daily(day: &str, temperature: i64, condition: &str) -> DailyForecast {
    DailyForecast {
        day: day.to_string(),
        temperature,
        condition: condition.to_string(),
        description: condition.to_string(),
    }
}

/// Title-case a (typically lowercased) cache key for display: "new york"
/// becomes "New York".
fn display_name(city: &str) -> String {
    city.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_city_uses_table_values() {
        let report = fallback_report("tokyo");

        assert_eq!(report.current.temperature, 22);
        assert_eq!(report.current.feels_like, 20);
        assert_eq!(report.location.name, "Tokyo");
        assert_eq!(report.location.country, "JP");
    }

    #[test]
    fn test_unknown_city_gets_default() {
        let report = fallback_report("atlantis");

        assert_eq!(report.current.temperature, DEFAULT_TEMP);
        assert_eq!(report.location.country, DEFAULT_COUNTRY);
        assert_eq!(report.location.name, "Atlantis");
    }

    #[test]
    fn test_multi_word_city_matches_and_title_cases() {
        let report = fallback_report("new york");

        assert_eq!(report.current.temperature, 18);
        assert_eq!(report.location.country, "US");
        assert_eq!(report.location.name, "New York");
    }

    #[test]
    fn test_forecast_rows_track_base_temperature() {
        let report = fallback_report("glasgow");

        assert_eq!(report.hourly.len(), 6);
        assert_eq!(report.daily.len(), 6);

        // Hourly curve: t, t+1, t+2, t+1, t, t-1 across 1 PM – 6 PM.
        let temps: Vec<i64> = report.hourly.iter().map(|h| h.temperature).collect();
        assert_eq!(temps, vec![10, 11, 12, 11, 10, 9]);
        assert_eq!(report.hourly[0].time, "1 PM");
        assert_eq!(report.hourly[5].time, "6 PM");

        assert_eq!(report.daily[0].day, "Today");
        assert_eq!(report.daily[1].temperature, 13, "Tue runs 3 above base");
        assert_eq!(report.daily[2].temperature, 8, "Wed runs 2 below base");
    }
}
