use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ev_telemetry_client::domain::{MeterSample, MeterStatus, VehiclePerformance, VehicleSample, VehicleStatus};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::{
    analytics::{AnalyticsAggregator, AnalyticsError},
    ingest::{IngestError, IngestionCoordinator},
    payload::TelemetryPayload,
    store::{StorageError, TelemetryStore},
};

pub struct AppState<S> {
    pub ingestion: IngestionCoordinator<S>,
    pub analytics: AnalyticsAggregator<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ingestion: self.ingestion.clone(),
            analytics: self.analytics.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Ingest(IngestError::MalformedPayload(_)) => StatusCode::BAD_REQUEST,
            Self::Ingest(IngestError::StorageUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Analytics(AnalyticsError::InvalidWindow(_)) => StatusCode::BAD_REQUEST,
            Self::Analytics(AnalyticsError::AggregationUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `Path` whose rejection renders as an `ApiError` body.
struct ApiPath<T>(T);

#[async_trait::async_trait]
impl<T, St> FromRequestParts<St> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection renders as an `ApiError` body.
struct ApiQuery<T>(T);

#[async_trait::async_trait]
impl<T, St> FromRequestParts<St> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub fn router<S: TelemetryStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/ingest", post(ingest::<S>))
        .route("/v1/analytics/performance/:vehicle_id", get(vehicle_performance::<S>))
        .route("/v1/status/meters/:meter_id", get(meter_status::<S>))
        .route("/v1/status/vehicles/:vehicle_id", get(vehicle_status::<S>))
        .route("/v1/history/meters/:meter_id", get(meter_history::<S>))
        .route("/v1/history/vehicles/:vehicle_id", get(vehicle_history::<S>))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Body is decoded here rather than through `Json` so every shape problem
/// surfaces as `MalformedPayload`.
async fn ingest<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    metrics::counter!("http_ingest_requests_total").increment(1);

    let payload = TelemetryPayload::from_json_slice(&body)?;
    state.ingestion.ingest(payload).await?;

    Ok((StatusCode::CREATED, Json(json!({ "status": "accepted" }))))
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    window_hours: Option<i64>,
}

async fn vehicle_performance<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    ApiPath(vehicle_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<VehiclePerformance>, ApiError> {
    let perf = match query.window_hours {
        Some(hours) => {
            let window = hours
                .checked_mul(3600)
                .map(Duration::seconds)
                .ok_or_else(|| ApiError::BadRequest(format!("window_hours {hours} is out of range")))?;
            state
                .analytics
                .vehicle_performance_over(&vehicle_id, window)
                .await?
        }
        None => state.analytics.vehicle_performance(&vehicle_id).await?,
    };
    Ok(Json(perf))
}

async fn meter_status<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    ApiPath(meter_id): ApiPath<String>,
) -> Result<Json<MeterStatus>, ApiError> {
    state
        .ingestion
        .store()
        .meter_status(&meter_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("meter '{meter_id}'")))
}

async fn vehicle_status<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    ApiPath(vehicle_id): ApiPath<String>,
) -> Result<Json<VehicleStatus>, ApiError> {
    state
        .ingestion
        .store()
        .vehicle_status(&vehicle_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("vehicle '{vehicle_id}'")))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    since: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    until: Option<OffsetDateTime>,
}

impl HistoryQuery {
    /// `[since, until)`, defaulting to the trailing 24 hours.
    fn range(&self) -> Result<(OffsetDateTime, OffsetDateTime), ApiError> {
        let until = self.until.unwrap_or_else(OffsetDateTime::now_utc);
        let since = self.since.unwrap_or(until - Duration::hours(24));
        if since >= until {
            return Err(ApiError::BadRequest("since must be before until".to_string()));
        }
        Ok((since, until))
    }
}

async fn meter_history<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    ApiPath(meter_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<MeterSample>>, ApiError> {
    let (since, until) = query.range()?;
    let rows = state
        .ingestion
        .store()
        .meter_history(&meter_id, since, until)
        .await?;
    Ok(Json(rows))
}

async fn vehicle_history<S: TelemetryStore>(
    State(state): State<AppState<S>>,
    ApiPath(vehicle_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<VehicleSample>>, ApiError> {
    let (since, until) = query.range()?;
    let rows = state
        .ingestion
        .store()
        .vehicle_history(&vehicle_id, since, until)
        .await?;
    Ok(Json(rows))
}
