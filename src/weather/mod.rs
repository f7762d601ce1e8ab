pub mod openweather;
pub mod types;

#[cfg(test)]
pub mod mock;

use crate::database::NewWeatherRecord;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: {0}")]
    ApiError(String),
}

/// External provider of current conditions. `Ok(None)` means the provider
/// answered but had no data to give.
#[async_trait]
pub trait WeatherUpstream: Send + Sync {
    async fn fetch_by_city(&self, city_name: &str) -> Result<Option<NewWeatherRecord>, UpstreamError>;

    async fn fetch_by_zip(&self, zip_code: &str) -> Result<Option<NewWeatherRecord>, UpstreamError>;
}

/// A location as a caller names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    City(String),
    Zip(String),
}

impl LookupKey {
    pub fn value(&self) -> &str {
        match self {
            LookupKey::City(name) => name,
            LookupKey::Zip(code) => code,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LookupKey::City(_) => "city",
            LookupKey::Zip(_) => "zip code",
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.value())
    }
}
