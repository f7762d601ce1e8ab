use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub database_url: String,
    pub bind_addr: String,
    pub refresh_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            openweather_api_key: env::var("OPENWEATHER_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENWEATHER_API_KEY not set"))?,
            openweather_base_url: env::var("OPENWEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".to_string()),
            openweather_current_path: env::var("OPENWEATHER_CURRENT_PATH")
                .unwrap_or_else(|_| "/data/2.5/weather".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./weather_cache.db?mode=rwc".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            refresh_interval_secs: parse_refresh_interval(env::var("REFRESH_INTERVAL_SECS").ok())?,
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Hourly unless overridden.
fn parse_refresh_interval(raw: Option<String>) -> anyhow::Result<u64> {
    let Some(raw) = raw else {
        return Ok(3600);
    };

    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("REFRESH_INTERVAL_SECS must be a number of seconds, got '{}'", raw))?;

    if secs == 0 {
        return Err(anyhow::anyhow!("REFRESH_INTERVAL_SECS must be greater than zero"));
    }

    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_defaults_to_hourly() {
        assert_eq!(parse_refresh_interval(None).unwrap(), 3600);
    }

    #[test]
    fn test_refresh_interval_override() {
        assert_eq!(parse_refresh_interval(Some(" 900 ".to_string())).unwrap(), 900);
    }

    #[test]
    fn test_refresh_interval_rejects_garbage() {
        let err = parse_refresh_interval(Some("hourly".to_string())).unwrap_err();
        assert!(err.to_string().contains("REFRESH_INTERVAL_SECS"));
        assert!(parse_refresh_interval(Some("0".to_string())).is_err());
    }
}
