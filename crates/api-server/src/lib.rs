pub mod complexity_routes;
pub mod config;
pub mod constraint_routes;
pub mod request_id;
pub mod security_headers;

use std::sync::Arc;

use analysis_core::{ComplexityError, ConstraintStore, ErrorGuidance};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use complexity_analyzer::{
    ComplexityAnalyzer, ConstraintEngine, ConstraintValidator, MetricsCalculator,
    SqliteConstraintStore,
};
use dashmap::DashMap;
use multi_timeframe::{BandedStrategySimulator, MultiTimeframeResult, StrategySimulator};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub analyzer: ComplexityAnalyzer,
    pub engine: ConstraintEngine,
    pub validator: ConstraintValidator,
    pub simulator: Arc<dyn StrategySimulator>,
    pub constraint_store: Option<Arc<dyn ConstraintStore>>,
    /// Latest optimization result per strategy id
    pub results: Arc<DashMap<String, MultiTimeframeResult>>,
}

impl AppState {
    pub fn new(config: ServerConfig, constraint_store: Option<Arc<dyn ConstraintStore>>) -> Self {
        let analyzer = ComplexityAnalyzer::new(MetricsCalculator::new(config.risk_free_rate));
        Self {
            config: Arc::new(config),
            analyzer,
            engine: ConstraintEngine::new(),
            validator: ConstraintValidator::new(),
            simulator: Arc::new(BandedStrategySimulator::new()),
            constraint_store,
            results: Arc::new(DashMap::new()),
        }
    }

    /// Store a result, evicting the oldest entry when the cache is full.
    pub fn cache_result(&self, result: MultiTimeframeResult) {
        if !self.results.contains_key(&result.strategy_id)
            && self.results.len() >= self.config.result_cache_size
        {
            let oldest = self
                .results
                .iter()
                .min_by_key(|entry| entry.value().generated_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.results.remove(&key);
            }
        }
        self.results.insert(result.strategy_id.clone(), result);
    }
}

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Handler error carrying an HTTP status and, for domain errors, guidance
/// on how to fix the request.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
    guidance: Option<ErrorGuidance>,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self {
            status,
            error,
            guidance: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<ErrorGuidance>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        } else {
            tracing::debug!("Request rejected: {}", self.error);
        }

        let body = ErrorBody {
            success: false,
            error: self.error.to_string(),
            guidance: self.guidance,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<ComplexityError> for AppError {
    fn from(error: ComplexityError) -> Self {
        let status = match &error {
            e if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            ComplexityError::OptimizationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ComplexityError::DataSource(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            guidance: Some(error.guidance()),
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
    constraint_store: bool,
    cached_results: usize,
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        constraint_store: state.constraint_store.is_some(),
        cached_results: state.results.len(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(complexity_routes::complexity_routes())
        .merge(constraint_routes::constraint_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers::security_headers_middleware,
        ))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting complexity API on {}", config.bind_addr());

    let constraint_store: Option<Arc<dyn ConstraintStore>> = match &config.database_url {
        Some(url) => match SqliteConstraintStore::connect(url).await {
            Ok(store) => {
                tracing::info!("Constraint store connected");
                Some(Arc::new(store) as Arc<dyn ConstraintStore>)
            }
            Err(e) => {
                tracing::warn!("Constraint store unavailable, continuing without it: {}", e);
                None
            }
        },
        None => None,
    };

    let addr = config.bind_addr();
    let app = build_router(AppState::new(config, constraint_store));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
