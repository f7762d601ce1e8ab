use crate::database::NewWeatherRecord;
use crate::weather::UpstreamError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of the provider's current-conditions endpoint. Only the fields this
/// service stores are modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    #[serde(default)]
    pub weather: Vec<CurrentWeatherCondition>,
    pub main: CurrentWeatherMain,
    pub wind: CurrentWeatherWind,
    #[serde(default)]
    pub name: String,
    pub dt: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherCondition {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherWind {
    pub speed: f64,
}

impl CurrentWeatherResponse {
    /// City lookups carry the provider's name for the place; zip lookups keep
    /// the caller's zip since the provider does not echo it. `queried` stands
    /// in for a blank provider name.
    pub fn into_record(
        self,
        queried: &str,
        zip_code: Option<&str>,
        retrieved_at: DateTime<Utc>,
    ) -> Result<NewWeatherRecord, UpstreamError> {
        let last_updated = DateTime::from_timestamp(self.dt, 0).ok_or_else(|| {
            UpstreamError::ApiError(format!("Invalid observation time: {}", self.dt))
        })?;

        let city_name = if self.name.trim().is_empty() {
            queried.to_string()
        } else {
            self.name
        };

        let (description, icon) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.description, w.icon))
            .unwrap_or_default();

        Ok(NewWeatherRecord {
            city_name,
            zip_code: zip_code.map(str::to_string),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            min_temperature: self.main.temp_min,
            max_temperature: self.main.temp_max,
            humidity: self.main.humidity.round() as i32,
            description,
            icon,
            wind_speed: self.wind.speed,
            last_updated,
            retrieved_at,
        })
    }
}
