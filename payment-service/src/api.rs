use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::handlers::TransactionHandler;
use crate::store::TransactionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub payment_base_url: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn TransactionStore>, payment_base_url: &str) -> Self {
        Self {
            store,
            payment_base_url: Arc::from(payment_base_url),
        }
    }

    fn handler(&self) -> TransactionHandler {
        TransactionHandler::new(self.store.clone(), self.payment_base_url.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub amount: Option<f64>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub payment_url: String,
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub event_id: Option<String>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/checkout", post(create_checkout))
        .route("/api/checkout/", post(create_checkout))
        .route("/api/webhook", post(handle_webhook))
        .route("/api/webhook/", post(handle_webhook))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Explicit origin list with credentials; methods and headers are mirrored from the
/// preflight since wildcards cannot be combined with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| {
            if o == "*" {
                warn!("Ignoring wildcard CORS origin; credentials require explicit origins");
                return None;
            }
            HeaderValue::from_str(o)
                .map_err(|e| warn!("Ignoring invalid CORS origin {}: {}", o, e))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub async fn create_checkout(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let command = CheckoutCommand::new(request.amount, request.email)?;

    let receipt = state.handler().create_checkout(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_url: receipt.payment_url,
            transaction_id: receipt.transaction_id,
        }),
    ))
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    payload: std::result::Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<Json<Transaction>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let command = WebhookCommand::new(
        request.event_id,
        request.transaction_id,
        request.status,
        request.email,
        request.amount,
    )?;

    let transaction = state.handler().apply_webhook(command).await?;
    Ok(Json(transaction))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
