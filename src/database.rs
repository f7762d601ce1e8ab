use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// One persisted snapshot of conditions for a location. Rows are never
/// updated; a newer snapshot is a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WeatherRecord {
    pub id: i64,
    pub city_name: String,
    pub zip_code: Option<String>,
    pub temperature: f64,
    pub feels_like: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub humidity: i32,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    /// Observation time reported by the provider.
    pub last_updated: DateTime<Utc>,
    /// When this service fetched the snapshot.
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeatherRecord {
    pub city_name: String,
    pub zip_code: Option<String>,
    pub temperature: f64,
    pub feels_like: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub humidity: i32,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    pub last_updated: DateTime<Utc>,
    pub retrieved_at: DateTime<Utc>,
}

/// Append-only store of weather snapshots.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Newest snapshot whose city name matches, ignoring case.
    async fn current_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError>;

    /// Newest snapshot whose zip code matches exactly.
    async fn current_by_zip(&self, zip_code: &str) -> Result<Option<WeatherRecord>, DatabaseError>;

    /// Up to `limit` snapshots for a city, newest first.
    async fn history_by_city(
        &self,
        city_name: &str,
        limit: i64,
    ) -> Result<Vec<WeatherRecord>, DatabaseError>;

    async fn append(&self, record: NewWeatherRecord) -> Result<WeatherRecord, DatabaseError>;

    async fn city_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn zip_codes(&self) -> Result<Vec<String>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Case-folded form of a city name. SQLite's `LOWER()` only folds ASCII, so
/// the folded name is computed here and stored alongside the row.
pub fn city_key(city_name: &str) -> String {
    city_name.to_lowercase()
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city_name TEXT NOT NULL,
                city_key TEXT NOT NULL,
                zip_code TEXT,
                temperature REAL NOT NULL,
                feels_like REAL NOT NULL,
                min_temperature REAL NOT NULL,
                max_temperature REAL NOT NULL,
                humidity INTEGER NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                wind_speed REAL NOT NULL,
                last_updated TEXT NOT NULL,
                retrieved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_weather_city_key ON weather_records(city_key)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_weather_zip_code ON weather_records(zip_code)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weather_retrieved_at ON weather_records(retrieved_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl WeatherStore for Database {
    async fn current_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let result = sqlx::query_as::<_, WeatherRecord>(
            r#"
            SELECT * FROM weather_records
            WHERE city_key = ?1
            ORDER BY retrieved_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(city_key(city_name))
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn current_by_zip(&self, zip_code: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let result = sqlx::query_as::<_, WeatherRecord>(
            r#"
            SELECT * FROM weather_records
            WHERE zip_code = ?1
            ORDER BY retrieved_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(zip_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn history_by_city(
        &self,
        city_name: &str,
        limit: i64,
    ) -> Result<Vec<WeatherRecord>, DatabaseError> {
        let results = sqlx::query_as::<_, WeatherRecord>(
            r#"
            SELECT * FROM weather_records
            WHERE city_key = ?1
            ORDER BY retrieved_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(city_key(city_name))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn append(&self, record: NewWeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        if record.city_name.trim().is_empty() {
            return Err(DatabaseError::InvalidData("city name must not be empty".to_string()));
        }

        let key = city_key(&record.city_name);
        let result = sqlx::query_as::<_, WeatherRecord>(
            r#"
            INSERT INTO weather_records (
                city_name, city_key, zip_code, temperature, feels_like,
                min_temperature, max_temperature, humidity, description, icon,
                wind_speed, last_updated, retrieved_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING *
            "#,
        )
        .bind(record.city_name)
        .bind(key)
        .bind(record.zip_code)
        .bind(record.temperature)
        .bind(record.feels_like)
        .bind(record.min_temperature)
        .bind(record.max_temperature)
        .bind(record.humidity)
        .bind(record.description)
        .bind(record.icon)
        .bind(record.wind_speed)
        .bind(record.last_updated)
        .bind(record.retrieved_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn city_names(&self) -> Result<Vec<String>, DatabaseError> {
        // One spelling per case-folded name
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT MIN(city_name) FROM weather_records
            WHERE city_key <> ''
            GROUP BY city_key
            ORDER BY city_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn zip_codes(&self) -> Result<Vec<String>, DatabaseError> {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT zip_code FROM weather_records
            WHERE zip_code IS NOT NULL AND zip_code <> ''
            ORDER BY zip_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

// In-memory store with per-key fault injection, for service tests
#[cfg(test)]
pub struct MockDatabase {
    records: std::sync::Arc<tokio::sync::RwLock<Vec<WeatherRecord>>>,
    failing_keys: std::sync::Arc<tokio::sync::RwLock<std::collections::HashSet<String>>>,
    fail_listing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockDatabase {
    pub fn new() -> Self {
        Self {
            records: std::sync::Arc::new(tokio::sync::RwLock::new(Vec::new())),
            failing_keys: std::sync::Arc::new(tokio::sync::RwLock::new(std::collections::HashSet::new())),
            fail_listing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Appends for this city (any case) or zip code will fail.
    pub async fn fail_appends_for(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_lowercase());
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<WeatherRecord> {
        self.records.read().await.clone()
    }

    pub async fn count_for_city(&self, city_name: &str) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| city_key(&r.city_name) == city_key(city_name))
            .count()
    }

    fn newest<'a>(records: impl Iterator<Item = &'a WeatherRecord>) -> Option<WeatherRecord> {
        records
            .max_by(|a, b| a.retrieved_at.cmp(&b.retrieved_at).then(a.id.cmp(&b.id)))
            .cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl WeatherStore for MockDatabase {
    async fn current_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let wanted = city_key(city_name);
        let records = self.records.read().await;
        Ok(Self::newest(
            records.iter().filter(|r| city_key(&r.city_name) == wanted),
        ))
    }

    async fn current_by_zip(&self, zip_code: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let records = self.records.read().await;
        Ok(Self::newest(
            records.iter().filter(|r| r.zip_code.as_deref() == Some(zip_code)),
        ))
    }

    async fn history_by_city(
        &self,
        city_name: &str,
        limit: i64,
    ) -> Result<Vec<WeatherRecord>, DatabaseError> {
        let wanted = city_key(city_name);
        let records = self.records.read().await;

        let mut history: Vec<_> = records
            .iter()
            .filter(|r| city_key(&r.city_name) == wanted)
            .cloned()
            .collect();

        history.sort_by(|a, b| b.retrieved_at.cmp(&a.retrieved_at).then(b.id.cmp(&a.id)));
        history.truncate(limit.max(0) as usize);

        Ok(history)
    }

    async fn append(&self, record: NewWeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        {
            let failing = self.failing_keys.read().await;
            let city_fails = failing.contains(&record.city_name.to_lowercase());
            let zip_fails = record
                .zip_code
                .as_ref()
                .is_some_and(|z| failing.contains(&z.to_lowercase()));
            if city_fails || zip_fails {
                return Err(DatabaseError::InvalidData(format!(
                    "injected append failure for {}",
                    record.city_name
                )));
            }
        }

        let mut records = self.records.write().await;
        let stored = WeatherRecord {
            id: records.len() as i64 + 1,
            city_name: record.city_name,
            zip_code: record.zip_code,
            temperature: record.temperature,
            feels_like: record.feels_like,
            min_temperature: record.min_temperature,
            max_temperature: record.max_temperature,
            humidity: record.humidity,
            description: record.description,
            icon: record.icon,
            wind_speed: record.wind_speed,
            last_updated: record.last_updated,
            retrieved_at: record.retrieved_at,
        };
        records.push(stored.clone());

        Ok(stored)
    }

    async fn city_names(&self) -> Result<Vec<String>, DatabaseError> {
        if self.fail_listing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DatabaseError::InvalidData("injected listing failure".to_string()));
        }

        let mut names: Vec<String> = Vec::new();
        for record in self.records.read().await.iter() {
            let key = city_key(&record.city_name);
            if !key.is_empty() && !names.iter().any(|n| city_key(n) == key) {
                names.push(record.city_name.clone());
            }
        }
        Ok(names)
    }

    async fn zip_codes(&self) -> Result<Vec<String>, DatabaseError> {
        if self.fail_listing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DatabaseError::InvalidData("injected listing failure".to_string()));
        }

        let mut codes: Vec<String> = Vec::new();
        for record in self.records.read().await.iter() {
            if let Some(zip) = record.zip_code.as_ref().filter(|z| !z.is_empty()) {
                if !codes.contains(zip) {
                    codes.push(zip.clone());
                }
            }
        }
        Ok(codes)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
pub fn sample_record(
    city_name: &str,
    zip_code: Option<&str>,
    temperature: f64,
    retrieved_at: DateTime<Utc>,
) -> NewWeatherRecord {
    NewWeatherRecord {
        city_name: city_name.to_string(),
        zip_code: zip_code.map(str::to_string),
        temperature,
        feels_like: temperature - 1.0,
        min_temperature: temperature - 3.0,
        max_temperature: temperature + 3.0,
        humidity: 65,
        description: "scattered clouds".to_string(),
        icon: "03d".to_string(),
        wind_speed: 4.1,
        last_updated: retrieved_at,
        retrieved_at,
    }
}
