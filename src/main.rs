use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clock;
mod config;
mod database;
mod refresh;
mod routes;
mod service;
mod weather;

use clock::SystemClock;
use config::Config;
use database::Database;
use routes::{create_router, AppState};
use service::WeatherService;
use weather::openweather::OpenWeatherClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_cache_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Initialize database
    let pool = sqlx::SqlitePool::connect(&config.database_url).await?;
    let database = Arc::new(Database::new(pool));
    database.init_tables().await?;

    let weather_client = Arc::new(OpenWeatherClient::new(config.clone())?);

    let weather_service = WeatherService::new(database, weather_client, Arc::new(SystemClock));

    refresh::spawn_schedule(weather_service.clone(), config.refresh_interval());
    tracing::info!(
        "Scheduled weather data refresh every {}s",
        config.refresh_interval_secs
    );

    let state = AppState { weather_service };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
