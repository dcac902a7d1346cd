//! HTTP surface: the webhook plus the edit and change trigger endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::change_notifier::ChangeNotifier;
use crate::config::AppConfig;
use crate::conversions::{GoogleAdsUploader, MetaUploader};
use crate::db::Database;
use crate::error::LeadIntakeError;
use crate::intake::LeadIntake;
use crate::models::{EditTarget, SheetEdit, WebhookResponse};
use crate::notifier::{mailer_from_config, Mailer};
use crate::relay::StatusRelay;
use crate::repository::{LeadRepository, SqliteLeadRepository};
use crate::schema::Column;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<LeadIntake>,
    pub relay: Arc<StatusRelay>,
    pub change_notifier: Arc<ChangeNotifier>,
    pub repository: Arc<dyn LeadRepository>,
    pub service_name: String,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wire every service from configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let database = Database::new(&config.database.url, config.database.max_connections)
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let mailer: Arc<dyn Mailer> = Arc::from(mailer_from_config(client.clone(), &config.notifications));
        let repository: Arc<dyn LeadRepository> = Arc::new(SqliteLeadRepository::new(database));

        Self::with_services(config, repository, mailer, client)
    }

    /// Wire services around an existing repository and mailer
    pub fn with_services(
        config: &AppConfig,
        repository: Arc<dyn LeadRepository>,
        mailer: Arc<dyn Mailer>,
        client: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let offset = config.sheet.offset()?;
        let intake = LeadIntake::new(
            repository.clone(),
            mailer.clone(),
            config.sheet.clone(),
            config.notifications.clone(),
        )?;
        let relay = StatusRelay::new(
            repository.clone(),
            Arc::new(GoogleAdsUploader::new(client.clone(), config.google_ads.clone())),
            Arc::new(MetaUploader::new(client, config.meta.clone())),
            offset,
        );
        let change_notifier = ChangeNotifier::new(
            repository.clone(),
            mailer,
            config.sheet.clone(),
            config.notifications.clone(),
        );

        Ok(Self {
            intake: Arc::new(intake),
            relay: Arc::new(relay),
            change_notifier: Arc::new(change_notifier),
            repository,
            service_name: config.server.service_name.clone(),
            max_body_bytes: config.server.max_body_bytes,
        })
    }
}

/// Build the router
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/", get(liveness_handler).post(webhook_handler).options(options_handler))
        .route("/leads/:lead_id", get(lead_handler))
        .route("/leads/:lead_id/edits", post(edit_handler))
        .route("/events/change", post(change_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Bind and serve until shutdown
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;

    if config.notifications.change_poll_secs > 0 {
        let notifier = state.change_notifier.clone();
        let every = Duration::from_secs(config.notifications.change_poll_secs);
        info!(every_secs = config.notifications.change_poll_secs, "Starting change notifier poll");
        tokio::spawn(notifier.run_poll(every));
    }

    let addr: SocketAddr = config.server.bind_addr.parse().context("Invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Lead intake listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[derive(Debug, Deserialize)]
struct EditRequest {
    column: Column,
    value: String,
}

async fn liveness_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("{} - lead intake is running", state.service_name),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn options_handler() -> Response {
    let mut resp = Json(json!({})).into_response();
    let headers = resp.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET,POST,OPTIONS"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("content-type"));
    resp
}

async fn webhook_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let envelope = state.intake.handle_request(&body, &query).await;
    let mut resp = Json(envelope).into_response();
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

async fn lead_handler(State(state): State<AppState>, Path(lead_id): Path<String>) -> Response {
    match state.repository.find_lead(&EditTarget::LeadId(lead_id.clone())).await {
        Ok(Some(lead)) => Json(lead).into_response(),
        Ok(None) => LeadIntakeError::LeadNotFound(lead_id).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn edit_handler(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
    Json(request): Json<EditRequest>,
) -> Response {
    let edit = SheetEdit {
        target: EditTarget::LeadId(lead_id),
        column: request.column,
        value: request.value,
    };
    match state.relay.on_edit(edit).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!(error = %e, "Error in status relay");
            e.into_response()
        },
    }
}

async fn change_handler(State(state): State<AppState>) -> Response {
    match state.change_notifier.check().await {
        Ok(check) => Json(check).into_response(),
        Err(e) => {
            error!(error = %e, "Error in change notifier");
            e.into_response()
        },
    }
}

impl IntoResponse for LeadIntakeError {
    fn into_response(self) -> Response {
        let status = match &self {
            LeadIntakeError::LeadNotFound(_) => StatusCode::NOT_FOUND,
            LeadIntakeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(WebhookResponse::failure(self.to_string()))).into_response()
    }
}
