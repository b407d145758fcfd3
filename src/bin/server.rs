use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaxspot_rs::{
    DEFAULT_MAX_RESULTS, DEFAULT_RADIUS_MILES, DEFAULT_ZIPCODE, FetchError, ReportBuilder,
    SpotterClient, Subscriber, SubscriberStore, ZipcodeIndex, is_valid_zipcode_format,
};

/// Server configuration
struct ServerConfig {
    port: u16,
    postal_codes_path: String,
    db_path: String,
    max_results: usize,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            postal_codes_path: env::var("VAXSPOT_POSTAL_CODES")
                .unwrap_or_else(|_| "postal_codes.json".to_string()),
            db_path: env::var("VAXSPOT_DB").unwrap_or_else(|_| "db.json".to_string()),
            max_results: env::var("VAXSPOT_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_RESULTS),
        }
    }
}

/// Application state shared across all requests
#[derive(Clone)]
struct AppState {
    client: Arc<SpotterClient>,
    index: Arc<ZipcodeIndex>,
    store: Arc<SubscriberStore>,
    max_results: usize,
    metrics: Arc<Metrics>,
}

/// Server metrics
struct Metrics {
    total_requests: AtomicU64,
    requests_in_flight: AtomicU64,
    start_time: Instant,
}

/// RAII guard for tracking in-flight requests
struct RequestGuard<'a>(&'a AtomicU64);

impl<'a> Drop for RequestGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Metrics {
    fn track_request(&self) -> RequestGuard<'_> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
        RequestGuard(&self.requests_in_flight)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,vaxspot_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Read configuration from environment
    let config = ServerConfig::from_env();

    let index = Arc::new(
        ZipcodeIndex::load(&config.postal_codes_path)
            .context("Failed to load zipcode coordinate table")?,
    );
    tracing::info!(
        zipcodes = index.len(),
        "Loaded zipcode table from {}",
        config.postal_codes_path
    );

    let store = Arc::new(
        SubscriberStore::open(&config.db_path).context("Failed to open subscriber store")?,
    );
    let client = Arc::new(SpotterClient::new().context("Failed to build feed client")?);

    // Build Axum app with routes
    let app = build_app(client, index, store, config.max_results);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the Axum application with routes and middleware
fn build_app(
    client: Arc<SpotterClient>,
    index: Arc<ZipcodeIndex>,
    store: Arc<SubscriberStore>,
    max_results: usize,
) -> Router {
    let metrics = Arc::new(Metrics {
        total_requests: AtomicU64::new(0),
        requests_in_flight: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let state = AppState {
        client,
        index,
        store,
        max_results,
        metrics,
    };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .route("/api/appointments", get(get_appointments))
        .route("/api/subscribers", post(create_subscriber))
        .route(
            "/api/subscribers/:id",
            get(get_subscriber).delete(delete_subscriber),
        )
        .route("/api/metrics", get(get_metrics))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
struct AppointmentsParams {
    zipcode: String,
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Serialize)]
struct AppointmentsResponse {
    success: bool,
    state: String,
    report: String,
}

/// Fetch the feed for one state and render a report around a zipcode
async fn get_appointments(
    State(state): State<AppState>,
    Query(params): Query<AppointmentsParams>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let _guard = state.metrics.track_request();

    if !is_valid_zipcode_format(&params.zipcode) {
        return Err(ApiError::BadRequest(format!(
            "'{}' is not a 5-digit zipcode",
            params.zipcode
        )));
    }

    let radius = params.radius.unwrap_or(DEFAULT_RADIUS_MILES);
    if radius <= 0.0 {
        return Err(ApiError::BadRequest("radius must be positive".to_string()));
    }

    let feed_state = params
        .state
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "CA".to_string());

    tracing::info!(
        zipcode = %params.zipcode,
        radius,
        state = %feed_state,
        "Building appointment report"
    );

    let records = state
        .client
        .fetch_state(&feed_state)
        .await
        .map_err(|e| match e {
            FetchError::UnsupportedState(code) => {
                ApiError::BadRequest(format!("unsupported state code: {}", code))
            }
            other => {
                tracing::error!("Feed fetch error: {}", other);
                ApiError::InternalError(other.to_string())
            }
        })?;

    let report = ReportBuilder::new(&state.index)
        .with_max_results(state.max_results)
        .build(&records, &vaxspot_rs::Query::new(radius, params.zipcode));

    Ok(Json(AppointmentsResponse {
        success: true,
        state: feed_state,
        report,
    }))
}

#[derive(Deserialize)]
struct CreateSubscriberRequest {
    id: i64,
    #[serde(default)]
    zipcode: Option<String>,
    #[serde(default)]
    range_miles: Option<f64>,
    #[serde(default)]
    active: bool,
}

#[derive(Serialize)]
struct SubscriberResponse {
    success: bool,
    subscriber: Subscriber,
}

/// Create or replace a subscriber record
async fn create_subscriber(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriberRequest>,
) -> Result<Json<SubscriberResponse>, ApiError> {
    let _guard = state.metrics.track_request();

    let zipcode = request.zipcode.unwrap_or_else(|| DEFAULT_ZIPCODE.to_string());
    if !is_valid_zipcode_format(&zipcode) || !state.index.contains(&zipcode) {
        return Err(ApiError::BadRequest(format!("invalid zipcode: {}", zipcode)));
    }

    let range_miles = request.range_miles.unwrap_or(DEFAULT_RADIUS_MILES);
    if !(range_miles > 0.0 && range_miles < 1999.0) {
        return Err(ApiError::BadRequest(
            "range must be between 0 and 1999 miles".to_string(),
        ));
    }

    let subscriber = Subscriber {
        id: request.id,
        zipcode,
        range_miles,
        active: request.active,
    };
    state
        .store
        .upsert(subscriber.clone())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(SubscriberResponse {
        success: true,
        subscriber,
    }))
}

async fn get_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SubscriberResponse>, ApiError> {
    let _guard = state.metrics.track_request();

    let subscriber = state
        .store
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("no subscriber with id {}", id)))?;

    Ok(Json(SubscriberResponse {
        success: true,
        subscriber,
    }))
}

async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.metrics.track_request();

    let removed = state
        .store
        .remove(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if !removed {
        return Err(ApiError::NotFound(format!("no subscriber with id {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Get server metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        total_requests: state.metrics.total_requests.load(Ordering::Relaxed),
        requests_in_flight: state.metrics.requests_in_flight.load(Ordering::Relaxed),
        uptime_seconds: state.metrics.start_time.elapsed().as_secs(),
        active_subscribers: state.store.active_count(),
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    total_requests: u64,
    requests_in_flight: u64,
    uptime_seconds: u64,
    active_subscribers: usize,
}

/// API error types
enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
