//! Web API module for Widget REST.
//!
//! This module exposes the site's sidebars and widgets over a JSON REST API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/sidebars` - List sidebars with their widgets
//! - `GET /api/sidebars/schema` - JSON Schema of a sidebar
//! - `GET /api/sidebars/{sidebar_id}` - Get one sidebar
//! - `GET /api/widgets` - List widgets
//! - `POST /api/widgets` - Create a widget in a sidebar
//! - `GET /api/widgets/schema` - JSON Schema of a widget
//! - `GET /api/widgets/{widget_id}` - Get one widget
//! - `PUT /api/widgets/{widget_id}` - Update, move or reposition a widget
//! - `DELETE /api/widgets/{widget_id}` - Delete a widget
//! - `GET /api/widget-types` - List widget types with inferred settings fields
//!
//! Successful `GET` responses carry a strong `ETag`; a request whose
//! `If-None-Match` matches it receives `304 Not Modified`.

pub mod permissions;
pub mod schema;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::WidgetError;
use crate::host::{SiteDefinition, StaticHost, WidgetHost};
use crate::models::SettingsRecord;
use crate::services::{DeletedWidget, WidgetService, WidgetUpdate, WidgetView};
use crate::store::{JsonFileStore, OptionStore};

use permissions::{authorize, ConfigPermissions, Operation, PermissionHook};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the web API.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    config: Arc<Config>,
    /// Sidebar and widget operations
    service: Arc<WidgetService>,
    /// Permission hook consulted before each operation
    permissions: Arc<dyn PermissionHook>,
}

impl AppState {
    /// Creates the application state from configuration.
    ///
    /// Loads the site file (or the built-in site) and opens the JSON option
    /// store; permissions come from the `[permissions]` table.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let site = match &config.paths.site_file {
            Some(path) => {
                info!("Loading site definition from {}", path.display());
                SiteDefinition::load(path)?
            }
            None => {
                info!("No site file configured, serving the built-in site");
                SiteDefinition::builtin()
            }
        };

        let data_file = config.paths.data_file()?;
        info!("Option store: {}", data_file.display());
        let store = JsonFileStore::open(data_file)?;

        let permissions = ConfigPermissions::from_config(&config)?;
        Self::with_backends(
            config,
            Arc::new(StaticHost::new(site)),
            Arc::new(store),
            Arc::new(permissions),
        )
    }

    /// Creates the application state over explicit host, store and permission hook.
    pub fn with_backends(
        config: Config,
        host: Arc<dyn WidgetHost>,
        store: Arc<dyn OptionStore>,
        permissions: Arc<dyn PermissionHook>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            service: Arc::new(WidgetService::new(host, store)?),
            permissions,
        })
    }

    /// Returns the configuration the server was started with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the widget service.
    #[must_use]
    pub fn service(&self) -> &WidgetService {
        &self.service
    }

    fn authorize(&self, operation: Operation) -> ApiResult<()> {
        authorize(self.permissions.as_ref(), operation).map_err(api_error)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current health status (e.g., "healthy").
    pub status: String,
    /// Application version.
    pub version: String,
}

/// Request body for creating a widget.
#[derive(Debug, Deserialize)]
pub struct CreateWidgetRequest {
    /// Base id of the widget type to instantiate.
    pub widget_base: String,
    /// Sidebar to place the new widget in.
    pub sidebar_id: String,
    /// 1-based position in the sidebar.
    #[serde(default = "default_position")]
    pub sidebar_position: i64,
}

const fn default_position() -> i64 {
    1
}

/// Request body for updating a widget.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWidgetRequest {
    /// Settings to merge into the widget instance.
    #[serde(default)]
    pub settings: SettingsRecord,
    /// Sidebar to move the widget to.
    #[serde(default)]
    pub sidebar_id: Option<String>,
    /// 1-based position, in the new sidebar or the current one.
    #[serde(default)]
    pub sidebar_position: Option<i64>,
}

impl From<UpdateWidgetRequest> for WidgetUpdate {
    fn from(request: UpdateWidgetRequest) -> Self {
        Self {
            settings: request.settings,
            sidebar_id: request.sidebar_id,
            sidebar_position: request.sidebar_position,
        }
    }
}

/// API error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
}

impl ApiError {
    fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

impl From<&WidgetError> for ApiError {
    fn from(err: &WidgetError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Converts a service error into an error response.
fn api_error(err: WidgetError) -> (StatusCode, Json<ApiError>) {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {err}");
    }
    (status, Json(ApiError::from(&err)))
}

/// Converts a malformed request body into an error response.
fn rejection_error(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    let status = rejection.status();
    (
        status,
        Json(ApiError::new("invalid_request", rejection.body_text(), status)),
    )
}

// ============================================================================
// ETag Support
// ============================================================================

/// Serializes `body` and attaches its ETag, answering 304 when the client's
/// copy is current.
fn json_with_etag<T: Serialize>(headers: &HeaderMap, body: &T) -> ApiResult<Response> {
    let bytes = serde_json::to_vec(body).map_err(|e| {
        api_error(WidgetError::from(
            anyhow::Error::from(e).context("Failed to serialize response"),
        ))
    })?;
    let etag = format!("\"{:x}\"", Sha256::digest(&bytes));

    if if_none_match(headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::ETAG, etag),
            (header::CONTENT_TYPE, "application/json".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// Whether the `If-None-Match` header lists `etag` (or `*`).
fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /health - Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/sidebars - List every sidebar with its widgets.
async fn list_sidebars(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    state.authorize(Operation::GetSidebars)?;
    let sidebars = state.service.list_sidebars().map_err(api_error)?;
    json_with_etag(&headers, &sidebars)
}

/// GET /api/sidebars/schema - JSON Schema of a sidebar.
async fn get_sidebar_schema(headers: HeaderMap) -> ApiResult<Response> {
    json_with_etag(&headers, &schema::sidebar_schema())
}

/// GET /api/sidebars/{sidebar_id} - Get one sidebar.
async fn get_sidebar(
    State(state): State<AppState>,
    Path(sidebar_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    state.authorize(Operation::GetSidebar)?;
    let sidebar = state.service.get_sidebar(&sidebar_id).map_err(api_error)?;
    json_with_etag(&headers, &sidebar)
}

/// GET /api/widgets - List every widget.
async fn list_widgets(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    state.authorize(Operation::GetWidgets)?;
    let widgets = state.service.list_widgets().map_err(api_error)?;
    json_with_etag(&headers, &widgets)
}

/// POST /api/widgets - Create a widget and place it in a sidebar.
async fn create_widget(
    State(state): State<AppState>,
    payload: Result<Json<CreateWidgetRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WidgetView>)> {
    state.authorize(Operation::CreateWidget)?;
    let Json(request) = payload.map_err(rejection_error)?;

    let widget = state
        .service
        .create_widget(
            &request.widget_base,
            &request.sidebar_id,
            request.sidebar_position,
        )
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(widget)))
}

/// GET /api/widgets/schema - JSON Schema of a widget.
async fn get_widget_schema(headers: HeaderMap) -> ApiResult<Response> {
    json_with_etag(&headers, &schema::widget_schema())
}

/// GET /api/widgets/{widget_id} - Get one widget.
async fn get_widget(
    State(state): State<AppState>,
    Path(widget_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    state.authorize(Operation::GetWidget)?;
    let widget = state.service.get_widget(&widget_id).map_err(api_error)?;
    json_with_etag(&headers, &widget)
}

/// PUT /api/widgets/{widget_id} - Update settings, move or reposition a widget.
async fn update_widget(
    State(state): State<AppState>,
    Path(widget_id): Path<String>,
    payload: Result<Json<UpdateWidgetRequest>, JsonRejection>,
) -> ApiResult<Json<WidgetView>> {
    state.authorize(Operation::UpdateWidget)?;
    let Json(request) = payload.map_err(rejection_error)?;

    let widget = state
        .service
        .update_widget(&widget_id, &request.into())
        .map_err(api_error)?;

    Ok(Json(widget))
}

/// DELETE /api/widgets/{widget_id} - Delete a widget.
async fn delete_widget(
    State(state): State<AppState>,
    Path(widget_id): Path<String>,
) -> ApiResult<Json<DeletedWidget>> {
    state.authorize(Operation::DeleteWidget)?;
    let deleted = state.service.delete_widget(&widget_id).map_err(api_error)?;
    Ok(Json(deleted))
}

/// GET /api/widget-types - List widget types with their inferred settings fields.
async fn list_widget_types(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    state.authorize(Operation::GetWidgets)?;
    json_with_etag(&headers, &state.service.list_widget_types())
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    // Permission hooks guard every operation; the server itself has no origin policy.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::ETAG]);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Sidebar endpoints
        .route("/api/sidebars", get(list_sidebars))
        .route("/api/sidebars/schema", get(get_sidebar_schema))
        .route("/api/sidebars/{sidebar_id}", get(get_sidebar))
        // Widget endpoints
        .route("/api/widgets", get(list_widgets).post(create_widget))
        .route("/api/widgets/schema", get(get_widget_schema))
        .route(
            "/api/widgets/{widget_id}",
            get(get_widget).put(update_widget).delete(delete_widget),
        )
        .route("/api/widget-types", get(list_widget_types))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the web server.
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an error if the state cannot be built or the server fails to start.
pub async fn run_server(config: Config, addr: SocketAddr) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let app = create_router(state);

    info!("Starting {} web server on {}", crate::constants::APP_NAME, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
