//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::ServiceConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_port(raw: &str, env_name: &str) -> Result<u16, Error> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| Error::Config(format!("{env_name} must be a port number (1-65535)")))
}

fn validate_config(config: &ServiceConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.host.trim().is_empty() {
        issues.push("host must not be empty".into());
    }
    if config.port == 0 {
        issues.push("port must be > 0".into());
    }
    if config.default_city.trim().is_empty() {
        issues.push("default_city must not be empty".into());
    }
    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.upstream.base_url.trim().is_empty() {
        issues.push("upstream.base_url must not be empty".into());
    } else if !config.upstream.base_url.starts_with("http://")
        && !config.upstream.base_url.starts_with("https://")
    {
        issues.push("upstream.base_url must start with http:// or https://".into());
    }
    if config.upstream.timeout_secs == 0 {
        issues.push("upstream.timeout_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load service configuration from environment and optional config file.
///
/// The API key is deliberately not required: without one the service still
/// starts and serves canned fallback data, which keeps local development
/// working before a key has been provisioned.
pub fn load_config() -> Result<ServiceConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = ServiceConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
        config.api_key = key;
    }
    if let Ok(host) = std::env::var("WEATHER_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        config.port = parse_port(&port, "PORT")?;
    }
    if let Ok(city) = std::env::var("WEATHER_DEFAULT_CITY") {
        let trimmed = city.trim();
        if trimmed.is_empty() {
            return Err(Error::Config(
                "WEATHER_DEFAULT_CITY must not be empty".into(),
            ));
        }
        config.default_city = trimmed.to_string();
    }
    if let Ok(ttl) = std::env::var("WEATHER_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_positive_u64(&ttl, "WEATHER_CACHE_TTL_SECS")?;
    }
    if let Ok(url) = std::env::var("OPENWEATHER_BASE_URL") {
        config.upstream.base_url = url;
    }
    if let Ok(timeout) = std::env::var("OPENWEATHER_TIMEOUT_SECS") {
        config.upstream.timeout_secs = parse_positive_u64(&timeout, "OPENWEATHER_TIMEOUT_SECS")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.port, 3023);
        assert_eq!(config.default_city, "London");
        assert_eq!(config.cache.ttl_secs, 180, "freshness window is 3 minutes");
    }

    #[test]
    fn test_toml_overrides_and_defaults_fill_gaps() {
        let config: ServiceConfig = toml::from_str(
            r#"
            api_key = "0123456789abcdef"
            port = 8080

            [cache]
            ttl_secs = 60
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.port, 8080);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.host, "127.0.0.1", "unset fields keep defaults");
        assert_eq!(config.upstream.timeout_secs, 30);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut config = ServiceConfig::default();
        config.default_city = "  ".into();
        config.cache.ttl_secs = 0;
        config.upstream.base_url = "ftp://example.com".into();

        let err = validate_config(&config).expect_err("config should be rejected");
        let message = err.to_string();
        assert!(message.contains("default_city"));
        assert!(message.contains("cache.ttl_secs"));
        assert!(message.contains("base_url"));
    }

    #[test]
    fn test_port_parsing() {
        assert_eq!(parse_port("3023", "PORT").expect("valid port"), 3023);
        assert!(parse_port("0", "PORT").is_err());
        assert!(parse_port("70000", "PORT").is_err());
        assert!(parse_port("http", "PORT").is_err());
    }

    #[test]
    fn test_positive_u64_parsing() {
        assert_eq!(
            parse_positive_u64(" 180 ", "TTL").expect("valid integer"),
            180
        );
        assert!(parse_positive_u64("0", "TTL").is_err());
        assert!(parse_positive_u64("-5", "TTL").is_err());
        assert!(parse_positive_u64("abc", "TTL").is_err());
    }
}
