use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    database::WeatherRecord,
    service::{WeatherService, WeatherServiceError},
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub weather_service: WeatherService,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Maximum number of records, newest first (default 10, at most 100).
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(OpenApi)]
#[openapi(
    paths(health, get_by_city, get_by_zip, get_history, refresh_weather_data),
    components(schemas(WeatherRecord, HealthResponse))
)]
pub struct ApiDoc;

pub fn status_for(error: &WeatherServiceError) -> StatusCode {
    match error {
        WeatherServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        WeatherServiceError::FetchFailed(_) | WeatherServiceError::StorageFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: WeatherServiceError, context: &str) -> (StatusCode, String) {
    let status = status_for(&error);
    match &error {
        WeatherServiceError::InvalidInput(msg) => {
            tracing::warn!("Invalid argument when {}: {}", context, msg);
            (status, msg.clone())
        }
        _ => {
            tracing::error!("Error when {}: {}", context, error);
            (status, "An error occurred while retrieving weather data.".to_string())
        }
    }
}

// Route handlers
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and storage are reachable", body = HealthResponse),
        (status = 503, description = "Storage is unreachable")
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    if let Err(e) = state.weather_service.store.health_check().await {
        tracing::error!("Health check failed: {}", e);
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/weather/city/{city_name}",
    params(("city_name" = String, Path, description = "City name, matched ignoring case")),
    responses(
        (status = 200, description = "Current weather", body = WeatherRecord),
        (status = 400, description = "Blank city name"),
        (status = 404, description = "No weather data for this city"),
        (status = 500, description = "Upstream or storage failure")
    )
)]
pub async fn get_by_city(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
) -> ApiResult<WeatherRecord> {
    match state.weather_service.get_by_city(&city_name).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("Weather data for city '{}' not found.", city_name),
        )),
        Err(e) => Err(error_response(e, "getting weather by city")),
    }
}

#[utoipa::path(
    get,
    path = "/api/weather/zip/{zip_code}",
    params(("zip_code" = String, Path, description = "Postal code, matched exactly")),
    responses(
        (status = 200, description = "Current weather", body = WeatherRecord),
        (status = 400, description = "Blank zip code"),
        (status = 404, description = "No weather data for this zip code"),
        (status = 500, description = "Upstream or storage failure")
    )
)]
pub async fn get_by_zip(
    State(state): State<AppState>,
    Path(zip_code): Path<String>,
) -> ApiResult<WeatherRecord> {
    match state.weather_service.get_by_zip(&zip_code).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("Weather data for zip code '{}' not found.", zip_code),
        )),
        Err(e) => Err(error_response(e, "getting weather by zip code")),
    }
}

#[utoipa::path(
    get,
    path = "/api/weather/history/{city_name}",
    params(
        ("city_name" = String, Path, description = "City name, matched ignoring case"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Stored snapshots, newest first", body = [WeatherRecord]),
        (status = 400, description = "Blank city name"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<Vec<WeatherRecord>> {
    state
        .weather_service
        .get_history(&city_name, params.limit)
        .await
        .map(Json)
        .map_err(|e| error_response(e, "getting weather history"))
}

#[utoipa::path(
    post,
    path = "/api/weather/refresh",
    responses((status = 202, description = "Refresh scheduled", body = String))
)]
pub async fn refresh_weather_data(State(state): State<AppState>) -> (StatusCode, String) {
    state.weather_service.trigger_refresh();
    (
        StatusCode::ACCEPTED,
        "Weather data refresh has been scheduled.".to_string(),
    )
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/weather/city/:city_name", get(get_by_city))
        .route("/api/weather/zip/:zip_code", get(get_by_zip))
        .route("/api/weather/history/:city_name", get(get_history))
        .route("/api/weather/refresh", post(refresh_weather_data))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
