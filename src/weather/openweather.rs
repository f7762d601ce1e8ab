use super::types::CurrentWeatherResponse;
use super::{UpstreamError, WeatherUpstream};
use crate::config::Config;
use crate::database::NewWeatherRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent("WeatherCacheServer/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_current(
        &self,
        location: (&str, &str),
    ) -> Result<Option<CurrentWeatherResponse>, UpstreamError> {
        let url = format!(
            "{}{}",
            self.config.openweather_base_url, self.config.openweather_current_path
        );

        let response = self
            .make_request(&url, &[
                location,
                ("units", "metric"),
                ("appid", self.config.openweather_api_key.as_str()),
            ])
            .await?;

        if response.is_null() {
            return Ok(None);
        }

        let current: CurrentWeatherResponse = serde_json::from_value(response)?;
        Ok(Some(current))
    }

    async fn make_request(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, UpstreamError> {
        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let json: Value = response.json().await?;
        Ok(json)
    }
}

#[async_trait]
impl WeatherUpstream for OpenWeatherClient {
    async fn fetch_by_city(&self, city_name: &str) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        let current = self.get_current(("q", city_name)).await?;
        current
            .map(|c| c.into_record(city_name, None, chrono::Utc::now()))
            .transpose()
    }

    async fn fetch_by_zip(&self, zip_code: &str) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        let current = self.get_current(("zip", zip_code)).await?;
        current
            .map(|c| c.into_record(zip_code, Some(zip_code), chrono::Utc::now()))
            .transpose()
    }
}
