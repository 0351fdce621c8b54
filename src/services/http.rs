use std::sync::Arc;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    auth::Authenticator, orders::OrderRequest, rates::RateRequest, users::UserRequest,
    ServiceError,
};
use crate::models::images::Upload;
use crate::settings::{self, Settings};

mod auth;
mod extract;
mod orders;
mod rates;
pub mod session;
mod users;

use session::SessionKeys;

/// Channels into the datastore-backed services.
#[derive(Clone)]
pub struct Backend {
    pub rates: mpsc::Sender<RateRequest>,
    pub orders: mpsc::Sender<OrderRequest>,
    pub users: mpsc::Sender<UserRequest>,
    pub authenticator: Arc<dyn Authenticator>,
}

#[derive(Clone)]
pub struct AppState {
    backend: Option<Backend>,
    sessions: Option<Arc<SessionKeys>>,
    admin_key: Option<String>,
    production: bool,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        if settings.session.is_none() {
            log::warn!("Session secret is not configured; sign-in is disabled.");
        }

        AppState {
            backend: None,
            sessions: settings
                .session
                .as_ref()
                .map(|session| Arc::new(SessionKeys::new(session))),
            admin_key: settings.admin.as_ref().map(|admin| admin.api_key.clone()),
            production: settings.server.production,
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    fn backend(&self) -> Result<&Backend, ServiceError> {
        self.backend
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("Datastore is not configured".to_string()))
    }

    fn session_keys(&self) -> Result<&SessionKeys, ServiceError> {
        self.sessions
            .as_deref()
            .ok_or_else(|| ServiceError::Unavailable("Sessions are not configured".to_string()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ServiceError::Validation { field, .. } => {
                (StatusCode::BAD_REQUEST, self.to_string(), Some(field.clone()))
            }
            ServiceError::InvalidToken(message) => (StatusCode::BAD_REQUEST, message.clone(), None),
            ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone(), None),
            ServiceError::Conflict(message) => (StatusCode::CONFLICT, message.clone(), None),
            ServiceError::InvalidCredentials | ServiceError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            ServiceError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, message.clone(), None)
            }
            ServiceError::UploadFailed(detail) => (
                StatusCode::BAD_GATEWAY,
                "Image upload failed".to_string(),
                Some(detail.clone()),
            ),
            ServiceError::Internal(_)
            | ServiceError::Repository(..)
            | ServiceError::Communication(..) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(self.to_string()),
            ),
        };

        if status.is_server_error() {
            log::error!("{}", self);
        }

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

/// Reads a file part. An empty part means no file was chosen.
async fn read_upload(field: Field<'_>, default_name: &str) -> Result<Option<Upload>, ServiceError> {
    let file_name = field.file_name().unwrap_or(default_name).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(Upload {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

async fn read_text(field: Field<'_>) -> Result<String, ServiceError> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::validation("form", &e.body_text())
}

fn cors_layer(public_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(public_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            log::warn!("Public URL {} is not a valid origin: {}", public_url, e);
            layer
        }
    }
}

pub fn router(state: AppState, server: &settings::Server) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/rate", get(rates::get_rate).post(rates::set_rate))
        .route("/api/transactions", post(orders::submit_order))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/{reference}", get(orders::track_order))
        .route("/api/referrals", get(orders::referral_summary))
        .route(
            "/api/user/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/api/user/change-password", post(users::change_password))
        .with_state(state)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors_layer(&server.public_url))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    state: AppState,
    server: &settings::Server,
) -> Result<(), anyhow::Error> {
    let app = router(state, server);

    let listener = tokio::net::TcpListener::bind(&server.listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("HTTP server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested.");
}
