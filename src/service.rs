use crate::clock::Clock;
use crate::database::{DatabaseError, NewWeatherRecord, WeatherRecord, WeatherStore};
use crate::weather::{LookupKey, UpstreamError, WeatherUpstream};
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;

/// Records retrieved within this many minutes are served without asking upstream.
pub const FRESHNESS_WINDOW_MINUTES: i64 = 30;
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Error, Debug)]
pub enum WeatherServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Upstream fetch failed: {0}")]
    FetchFailed(#[from] UpstreamError),
    #[error("Storage failed: {0}")]
    StorageFailed(#[from] DatabaseError),
}

/// Read-through cache over the weather store and the upstream provider.
#[derive(Clone)]
pub struct WeatherService {
    pub(crate) store: Arc<dyn WeatherStore>,
    pub(crate) upstream: Arc<dyn WeatherUpstream>,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn new(
        store: Arc<dyn WeatherStore>,
        upstream: Arc<dyn WeatherUpstream>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            upstream,
            clock,
        }
    }

    pub async fn get_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, WeatherServiceError> {
        self.resolve(LookupKey::City(city_name.to_string())).await
    }

    pub async fn get_by_zip(&self, zip_code: &str) -> Result<Option<WeatherRecord>, WeatherServiceError> {
        self.resolve(LookupKey::Zip(zip_code.to_string())).await
    }

    /// Returns the current record for `key` if it is fresh, otherwise fetches
    /// from upstream and appends the result. When upstream has nothing, the
    /// answer is `None` even if a stale record exists.
    pub async fn resolve(&self, key: LookupKey) -> Result<Option<WeatherRecord>, WeatherServiceError> {
        let key = validate_key(key)?;

        let stored = match &key {
            LookupKey::City(name) => self.store.current_by_city(name).await?,
            LookupKey::Zip(code) => self.store.current_by_zip(code).await?,
        };

        if let Some(record) = stored.filter(|r| self.is_fresh(r)) {
            tracing::debug!("Serving cached weather for {} (record {})", key, record.id);
            return Ok(Some(record));
        }

        tracing::info!("Fetching fresh weather data for {}", key);
        let Some(fetched) = self.fetch(&key).await? else {
            tracing::warn!("Upstream returned no weather data for {}", key);
            return Ok(None);
        };

        let record = self.persist(fetched).await?;
        Ok(Some(record))
    }

    pub async fn get_history(
        &self,
        city_name: &str,
        limit: Option<u32>,
    ) -> Result<Vec<WeatherRecord>, WeatherServiceError> {
        let city_name = non_blank(city_name, "City name")?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);

        if limit == 0 {
            return Ok(Vec::new());
        }

        Ok(self.store.history_by_city(&city_name, limit as i64).await?)
    }

    pub fn is_fresh(&self, record: &WeatherRecord) -> bool {
        self.clock.now() - record.retrieved_at <= Duration::minutes(FRESHNESS_WINDOW_MINUTES)
    }

    pub(crate) async fn fetch(&self, key: &LookupKey) -> Result<Option<NewWeatherRecord>, UpstreamError> {
        match key {
            LookupKey::City(name) => self.upstream.fetch_by_city(name).await,
            LookupKey::Zip(code) => self.upstream.fetch_by_zip(code).await,
        }
    }

    /// Appends a new snapshot, stamped with the write time.
    pub(crate) async fn persist(&self, mut record: NewWeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        record.retrieved_at = self.clock.now();
        self.store.append(record).await
    }
}

fn validate_key(key: LookupKey) -> Result<LookupKey, WeatherServiceError> {
    match key {
        LookupKey::City(name) => Ok(LookupKey::City(non_blank(&name, "City name")?)),
        LookupKey::Zip(code) => Ok(LookupKey::Zip(non_blank(&code, "Zip code")?)),
    }
}

fn non_blank(value: &str, what: &str) -> Result<String, WeatherServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WeatherServiceError::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}
