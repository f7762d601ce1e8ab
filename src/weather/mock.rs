use super::{UpstreamError, WeatherUpstream};
use crate::database::NewWeatherRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum MockReply {
    Weather { city_name: String, temperature: f64 },
    Absent,
    Failure(String),
}

/// Scripted upstream that records every call it receives.
#[derive(Default)]
pub struct MockWeatherClient {
    replies: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<String>>,
}

impl MockWeatherClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weather(self, key: &str, city_name: &str, temperature: f64) -> Self {
        self.set(key, MockReply::Weather { city_name: city_name.to_string(), temperature });
        self
    }

    pub fn with_absent(self, key: &str) -> Self {
        self.set(key, MockReply::Absent);
        self
    }

    pub fn with_failure(self, key: &str, message: &str) -> Self {
        self.set(key, MockReply::Failure(message.to_string()));
        self
    }

    pub fn set(&self, key: &str, reply: MockReply) {
        self.replies.lock().unwrap().insert(key.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn reply(&self, key: &str, zip_code: Option<&str>) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        self.calls.lock().unwrap().push(key.to_string());

        let reply = self.replies.lock().unwrap().get(key).cloned();
        match reply {
            Some(MockReply::Weather { city_name, temperature }) => {
                let now = Utc::now();
                Ok(Some(NewWeatherRecord {
                    city_name,
                    zip_code: zip_code.map(str::to_string),
                    temperature,
                    feels_like: temperature,
                    min_temperature: temperature - 2.0,
                    max_temperature: temperature + 2.0,
                    humidity: 60,
                    description: "clear sky".to_string(),
                    icon: "01d".to_string(),
                    wind_speed: 3.0,
                    last_updated: now,
                    retrieved_at: now,
                }))
            }
            Some(MockReply::Failure(message)) => Err(UpstreamError::ApiError(message)),
            Some(MockReply::Absent) | None => Ok(None),
        }
    }
}

#[async_trait]
impl WeatherUpstream for MockWeatherClient {
    async fn fetch_by_city(&self, city_name: &str) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        self.reply(city_name, None)
    }

    async fn fetch_by_zip(&self, zip_code: &str) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        self.reply(zip_code, Some(zip_code))
    }
}
