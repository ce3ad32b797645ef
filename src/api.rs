use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::{
        NotificationStore, ReminderSource, SendProvider,
        database::DatabaseClient,
        gateway::{MailGatewayClient, SmsGatewayClient},
        ils::IlsGatewayClient,
    },
    config::Config,
    models::{delivery::DeliverySummary, reminder::ReminderSummary, response::ApiResponse},
    scheduler::{ReminderScheduler, SchedulerError},
    secrets::OneTimeSecretStore,
    worker::DeliveryWorker,
};

const SCHEDULER_SECRET_HEADER: &str = "x-scheduler-secret";

pub struct AppState {
    store: Arc<dyn NotificationStore>,
    worker: DeliveryWorker,
    scheduler: ReminderScheduler,
    secrets: OneTimeSecretStore,
    default_batch_limit: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mail: Arc<dyn SendProvider>,
        sms: Arc<dyn SendProvider>,
        source: Arc<dyn ReminderSource>,
        config: &Config,
    ) -> Self {
        Self {
            worker: DeliveryWorker::new(Arc::clone(&store), mail, sms),
            scheduler: ReminderScheduler::new(source, Arc::clone(&store), config),
            secrets: OneTimeSecretStore::new(Duration::from_secs(config.secret_ttl_seconds)),
            store,
            default_batch_limit: config.delivery_batch_limit,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/deliveries/run", post(run_deliveries))
        .route("/api/v1/deliveries/{event_id}/retry", post(retry_delivery))
        .route("/api/v1/reminders/run", post(run_reminders))
        .route("/api/v1/secrets", post(store_secret))
        .route("/api/v1/secrets/{token}/consume", post(consume_secret))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn NotificationStore> =
        Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let mail: Arc<dyn SendProvider> = Arc::new(MailGatewayClient::new(
        config.mail_gateway_url.clone(),
        config.library_email.clone(),
        config.retry_config(),
    )?);
    let sms: Arc<dyn SendProvider> = Arc::new(SmsGatewayClient::new(
        config.sms_gateway_url.clone(),
        config.retry_config(),
    )?);
    let source: Arc<dyn ReminderSource> = Arc::new(IlsGatewayClient::new(
        config.ils_gateway_url.clone(),
        config.retry_config(),
    )?);

    let state = Arc::new(AppState::new(store, mail, sms, source, &config));

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Notice service started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                "healthy".to_string(),
                "Service is healthy".to_string(),
            )),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(
                e.to_string(),
                "Store is unreachable".to_string(),
            )),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct RunDeliveriesParams {
    limit: Option<u32>,
}

async fn run_deliveries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunDeliveriesParams>,
) -> (StatusCode, Json<ApiResponse<DeliverySummary>>) {
    let limit = params.limit.unwrap_or(state.default_batch_limit);

    if limit == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "invalid_limit".to_string(),
                "Limit must be a positive integer".to_string(),
            )),
        );
    }

    match state.worker.process_pending(limit).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                summary,
                "Delivery batch processed".to_string(),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(
                e.to_string(),
                "Failed to read pending deliveries".to_string(),
            )),
        ),
    }
}

#[derive(Debug, Serialize)]
struct RetryResponse {
    delivery_id: Uuid,
}

async fn retry_delivery(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<RetryResponse>>) {
    match state.worker.enqueue_retry(event_id).await {
        Ok(Some(delivery_id)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                RetryResponse { delivery_id },
                "Delivery re-enqueued".to_string(),
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                "unknown_event".to_string(),
                "No notification event with that id".to_string(),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(
                e.to_string(),
                "Failed to re-enqueue delivery".to_string(),
            )),
        ),
    }
}

async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse<ReminderSummary>>) {
    let provided = headers
        .get(SCHEDULER_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.scheduler.run_due_reminders(provided).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                summary,
                "Reminder run complete".to_string(),
            )),
        ),
        Err(e @ SchedulerError::MissingSecret) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(
                "configuration_error".to_string(),
                e.to_string(),
            )),
        ),
        Err(e @ SchedulerError::Unauthorized) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("unauthorized".to_string(), e.to_string())),
        ),
        Err(SchedulerError::Source(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(
                e.to_string(),
                "Reminder scan failed".to_string(),
            )),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct StoreSecretRequest {
    secret: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

async fn store_secret(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreSecretRequest>,
) -> (StatusCode, Json<ApiResponse<TokenResponse>>) {
    let token = state.secrets.store(request.secret).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            TokenResponse { token },
            "Secret stored".to_string(),
        )),
    )
}

#[derive(Debug, Serialize)]
struct SecretResponse {
    secret: String,
}

async fn consume_secret(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> (StatusCode, Json<ApiResponse<SecretResponse>>) {
    match state.secrets.consume(&token).await {
        Some(secret) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SecretResponse { secret },
                "Secret consumed".to_string(),
            )),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                "not_found".to_string(),
                "No secret for that token".to_string(),
            )),
        ),
    }
}
