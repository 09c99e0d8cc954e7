use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{
    ComplexityError, ComplexityScore, Constraint, ReturnSeries, RiskPreference, StrategyParams,
    Timeframe,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use complexity_analyzer::validate_return_series;
use multi_timeframe::{MultiTimeframeOptimizer, MultiTimeframeResult, StaticReturnsProvider};
use serde::{Deserialize, Serialize};

use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

fn default_lookback_days() -> i64 {
    365
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub returns: ReturnSeries,
    #[serde(default)]
    pub params: StrategyParams,
    pub benchmark: Option<ReturnSeries>,
    /// When set, the series is checked against the timeframe's data minimums
    pub timeframe: Option<Timeframe>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

#[derive(Deserialize)]
pub struct CompareRequest {
    pub returns_by_level: BTreeMap<u8, ReturnSeries>,
    #[serde(default)]
    pub params: StrategyParams,
}

#[derive(Deserialize)]
pub struct OptimalRequest {
    pub returns_by_level: BTreeMap<u8, ReturnSeries>,
    #[serde(default)]
    pub params: StrategyParams,
    #[serde(default)]
    pub risk_preference: RiskPreference,
}

#[derive(Serialize)]
pub struct OptimalResponse {
    pub optimal_level: u8,
    pub score: ComplexityScore,
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub strategy_id: String,
    /// Price-like series per timeframe
    pub returns: BTreeMap<Timeframe, ReturnSeries>,
    /// Defaults to every timeframe in `returns`
    pub timeframes: Option<Vec<Timeframe>>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Falls back to the saved constraints of `strategy_id` when omitted
    pub constraints: Option<Vec<Constraint>>,
    pub weights: Option<BTreeMap<Timeframe, f64>>,
}

#[derive(Serialize)]
pub struct OptimizeResponse {
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MultiTimeframeResult>,
    /// Rough estimate returned instead of a result when the deadline passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ComplexityScore>,
}

pub fn complexity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/complexity/analyze", post(analyze))
        .route("/api/complexity/compare", post(compare))
        .route("/api/complexity/optimal", post(find_optimal))
        .route("/api/complexity/optimize", post(optimize))
        .route(
            "/api/complexity/optimize/:strategy_id/latest",
            get(latest_optimization),
        )
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<ComplexityScore>>, AppError> {
    if let Some(timeframe) = req.timeframe {
        validate_return_series(&req.returns, timeframe, req.lookback_days)?;
    }

    let score = state
        .analyzer
        .analyze(&req.returns, &req.params, req.benchmark.as_ref())?;

    Ok(Json(ApiResponse::success(score)))
}

async fn compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ApiResponse<BTreeMap<u8, ComplexityScore>>>, AppError> {
    let analyzer = state.analyzer;
    let scores = tokio::task::spawn_blocking(move || {
        analyzer.compare(&req.returns_by_level, &req.params)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Comparison task failed: {e}"))??;

    Ok(Json(ApiResponse::success(scores)))
}

async fn find_optimal(
    State(state): State<AppState>,
    Json(req): Json<OptimalRequest>,
) -> Result<Json<ApiResponse<OptimalResponse>>, AppError> {
    let analyzer = state.analyzer;
    let (optimal_level, score) = tokio::task::spawn_blocking(move || {
        analyzer.find_optimal(&req.returns_by_level, &req.params, req.risk_preference)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Optimal level task failed: {e}"))??;

    Ok(Json(ApiResponse::success(OptimalResponse {
        optimal_level,
        score,
    })))
}

async fn optimize(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<ApiResponse<OptimizeResponse>>, AppError> {
    let timeframes = req
        .timeframes
        .clone()
        .unwrap_or_else(|| req.returns.keys().copied().collect());
    if timeframes.len() > state.config.max_timeframes {
        return Err(ComplexityError::InvalidParameter(format!(
            "At most {} timeframes can be optimized at once, got {}",
            state.config.max_timeframes,
            timeframes.len()
        ))
        .into());
    }

    let constraints = match req.constraints {
        Some(c) => c,
        None => match &state.constraint_store {
            Some(store) => store.load_constraints(&req.strategy_id).await?,
            None => Vec::new(),
        },
    };

    let provider = Arc::new(StaticReturnsProvider::new(req.returns.clone()));
    let optimizer = MultiTimeframeOptimizer::new(provider)
        .with_simulator(Arc::clone(&state.simulator))
        .with_analyzer(state.analyzer);

    tracing::info!(
        "[{}] optimize {} over {:?}",
        request_id.0,
        req.strategy_id,
        timeframes
    );

    let outcome = optimizer
        .optimize_within(
            state.config.optimization_timeout(),
            &req.strategy_id,
            &timeframes,
            req.lookback_days,
            &constraints,
            req.weights.as_ref(),
        )
        .await;

    match outcome {
        Ok(result) => {
            let warnings = result.warnings.clone();
            state.cache_result(result.clone());
            Ok(Json(
                ApiResponse::success(OptimizeResponse {
                    timed_out: false,
                    result: Some(result),
                    fallback: None,
                })
                .with_warnings(warnings),
            ))
        }
        Err(ComplexityError::OptimizationTimeout { seconds }) => {
            tracing::warn!(
                "[{}] optimization of {} timed out after {}s, returning fallback",
                request_id.0,
                req.strategy_id,
                seconds
            );
            let series = req
                .returns
                .get(&Timeframe::Day1)
                .or_else(|| req.returns.values().next());
            Ok(Json(ApiResponse::success(OptimizeResponse {
                timed_out: true,
                result: None,
                fallback: Some(optimizer.fallback_score(series)),
            })))
        }
        Err(e) => Err(e.into()),
    }
}

async fn latest_optimization(
    State(state): State<AppState>,
    Path(strategy_id): Path<String>,
) -> Result<Json<ApiResponse<MultiTimeframeResult>>, AppError> {
    let result = state
        .results
        .get(&strategy_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| {
            AppError::with_status(
                StatusCode::NOT_FOUND,
                anyhow::anyhow!("No optimization result for {strategy_id}"),
            )
        })?;

    Ok(Json(ApiResponse::success(result)))
}
