use crate::service::{WeatherService, WeatherServiceError};
use crate::weather::LookupKey;
use std::time::Duration;
use tokio::task::JoinHandle;

impl WeatherService {
    /// Re-fetches every city and zip code ever stored, regardless of freshness,
    /// and appends whatever upstream returns. A failing key is logged and
    /// skipped; only a failure to list the keys aborts the run.
    pub async fn refresh_all(&self) -> Result<(), WeatherServiceError> {
        tracing::info!("Starting weather data refresh");

        let cities = self.store.city_names().await.inspect_err(|e| {
            tracing::error!("Weather data refresh aborted, could not list cities: {}", e);
        })?;
        let zip_codes = self.store.zip_codes().await.inspect_err(|e| {
            tracing::error!("Weather data refresh aborted, could not list zip codes: {}", e);
        })?;

        let keys = cities
            .into_iter()
            .map(LookupKey::City)
            .chain(zip_codes.into_iter().map(LookupKey::Zip));

        let mut refreshed = 0usize;
        let mut failed = 0usize;

        for key in keys {
            match self.refresh_key(&key).await {
                Ok(true) => refreshed += 1,
                Ok(false) => tracing::warn!("Upstream returned no weather data for {}", key),
                Err(e) => {
                    failed += 1;
                    tracing::error!("Error refreshing weather data for {}: {}", key, e);
                }
            }
        }

        tracing::info!(
            "Completed weather data refresh: {} refreshed, {} failed",
            refreshed,
            failed
        );
        Ok(())
    }

    async fn refresh_key(&self, key: &LookupKey) -> Result<bool, WeatherServiceError> {
        match self.fetch(key).await? {
            Some(record) => {
                self.persist(record).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Starts `refresh_all` in the background and returns at once.
    pub fn trigger_refresh(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service.refresh_all().await;
        });
    }
}

/// Runs `refresh_all` every `period`, starting one period from now.
pub fn spawn_schedule(service: WeatherService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // Skip the first tick (immediate)
        interval.tick().await;

        loop {
            interval.tick().await;
            let _ = service.refresh_all().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::database::{sample_record, WeatherStore};
    use crate::service::test_support::{harness, now};
    use crate::service::WeatherServiceError;
    use crate::weather::mock::MockWeatherClient;
    use chrono::Duration;

    #[tokio::test]
    async fn test_refresh_fetches_each_known_key_once() {
        let h = harness(
            MockWeatherClient::new()
                .with_weather("London", "London", 15.0)
                .with_weather("Paris", "Paris", 18.0)
                .with_weather("Beverly Hills", "Beverly Hills", 26.0)
                .with_weather("90210", "Beverly Hills", 27.0),
        );
        h.db.append(sample_record("London", None, 10.0, now())).await.unwrap();
        h.db.append(sample_record("London", None, 11.0, now())).await.unwrap();
        h.db.append(sample_record("Paris", None, 12.0, now())).await.unwrap();
        h.db.append(sample_record("Beverly Hills", Some("90210"), 20.0, now()))
            .await
            .unwrap();

        h.service.refresh_all().await.unwrap();

        // Cities first, then zip codes
        assert_eq!(h.upstream.calls(), vec!["London", "Paris", "Beverly Hills", "90210"]);
        assert_eq!(h.db.all().await.len(), 8);

        let zip_current = h.db.current_by_zip("90210").await.unwrap().unwrap();
        assert_eq!(zip_current.temperature, 27.0);
        assert_eq!(zip_current.retrieved_at, now());
    }

    #[tokio::test]
    async fn test_refresh_ignores_freshness() {
        let h = harness(MockWeatherClient::new().with_weather("Oslo", "Oslo", 3.0));
        h.db.append(sample_record("Oslo", None, 1.0, now() - Duration::minutes(1)))
            .await
            .unwrap();

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.call_count(), 1);
        assert_eq!(h.db.count_for_city("Oslo").await, 2);
    }

    #[tokio::test]
    async fn test_case_variants_of_a_city_refresh_once() {
        let h = harness(MockWeatherClient::new().with_weather("Lyon", "Lyon", 17.0));
        h.db.append(sample_record("Lyon", None, 15.0, now())).await.unwrap();
        h.db.append(sample_record("LYON", None, 16.0, now())).await.unwrap();

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.calls(), vec!["Lyon"]);
        assert_eq!(h.db.count_for_city("lyon").await, 3);
    }

    #[tokio::test]
    async fn test_failing_key_does_not_stop_the_batch() {
        let h = harness(
            MockWeatherClient::new()
                .with_failure("Atlantis", "HTTP 502")
                .with_weather("Berlin", "Berlin", 9.0),
        );
        h.db.append(sample_record("Atlantis", None, 30.0, now() - Duration::hours(3)))
            .await
            .unwrap();
        h.db.append(sample_record("Berlin", None, 7.0, now() - Duration::hours(3)))
            .await
            .unwrap();

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.calls(), vec!["Atlantis", "Berlin"]);
        assert_eq!(h.db.count_for_city("Atlantis").await, 1);
        assert_eq!(h.db.count_for_city("Berlin").await, 2);
    }

    #[tokio::test]
    async fn test_storage_failure_on_one_key_is_isolated() {
        let h = harness(
            MockWeatherClient::new()
                .with_weather("Madrid", "Madrid", 31.0)
                .with_weather("Lisbon", "Lisbon", 24.0),
        );
        h.db.append(sample_record("Madrid", None, 30.0, now())).await.unwrap();
        h.db.append(sample_record("Lisbon", None, 22.0, now())).await.unwrap();
        h.db.fail_appends_for("Madrid").await;

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.call_count(), 2);
        assert_eq!(h.db.count_for_city("Madrid").await, 1);
        assert_eq!(h.db.count_for_city("Lisbon").await, 2);
    }

    #[tokio::test]
    async fn test_absent_upstream_data_writes_nothing() {
        let h = harness(MockWeatherClient::new().with_absent("Rome"));
        h.db.append(sample_record("Rome", None, 20.0, now())).await.unwrap();

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.call_count(), 1);
        assert_eq!(h.db.count_for_city("Rome").await, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let h = harness(MockWeatherClient::new().with_weather("Rome", "Rome", 20.0));
        h.db.append(sample_record("Rome", None, 20.0, now())).await.unwrap();
        h.db.fail_listing();

        let err = h.service.refresh_all().await.unwrap_err();

        assert!(matches!(err, WeatherServiceError::StorageFailed(_)));
        assert_eq!(h.upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let h = harness(MockWeatherClient::new());

        h.service.refresh_all().await.unwrap();

        assert_eq!(h.upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_trigger_refresh_runs_in_background() {
        let h = harness(MockWeatherClient::new().with_weather("Vienna", "Vienna", 12.0));
        h.db.append(sample_record("Vienna", None, 10.0, now())).await.unwrap();

        h.service.trigger_refresh();

        for _ in 0..100 {
            if h.db.count_for_city("Vienna").await == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(h.db.count_for_city("Vienna").await, 2);
    }

    #[tokio::test]
    async fn test_schedule_repeats_refresh() {
        let h = harness(MockWeatherClient::new().with_weather("Prague", "Prague", 14.0));
        h.db.append(sample_record("Prague", None, 10.0, now())).await.unwrap();

        let handle = super::spawn_schedule(h.service.clone(), std::time::Duration::from_millis(20));

        for _ in 0..100 {
            if h.upstream.call_count() >= 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(h.upstream.call_count() >= 2);
    }
}
