use analysis_core::{Constraint, MetricValues};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub constraints: Vec<Constraint>,
    pub values: MetricValues,
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub satisfied: bool,
    pub violations: Vec<String>,
    /// Weighted partial-credit satisfaction, 0-100
    pub score: f64,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub constraints: Vec<Constraint>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub constraint_count: usize,
    pub hard_count: usize,
}

pub fn constraint_routes() -> Router<AppState> {
    Router::new()
        .route("/api/constraints/evaluate", post(evaluate_constraints))
        .route("/api/constraints/validate", post(validate_constraints))
        .route("/api/constraints/:strategy_id", get(get_saved_constraints))
}

async fn evaluate_constraints(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<ApiResponse<EvaluateResponse>>, AppError> {
    for constraint in &req.constraints {
        state.validator.validate_constraint(constraint)?;
    }

    let (satisfied, violations) = state.engine.evaluate(&req.constraints, &req.values);
    let score = state.engine.score(&req.constraints, &req.values);

    Ok(Json(ApiResponse::success(EvaluateResponse {
        satisfied,
        violations,
        score,
    })))
}

async fn validate_constraints(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ApiResponse<ValidateResponse>>, AppError> {
    let warnings = state.validator.validate_constraints(&req.constraints)?;

    Ok(Json(
        ApiResponse::success(ValidateResponse {
            valid: true,
            constraint_count: req.constraints.len(),
            hard_count: req.constraints.iter().filter(|c| c.is_hard).count(),
        })
        .with_warnings(warnings),
    ))
}

async fn get_saved_constraints(
    State(state): State<AppState>,
    Path(strategy_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Constraint>>>, AppError> {
    let store = state.constraint_store.as_ref().ok_or_else(|| {
        AppError::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            anyhow::anyhow!("Constraint store not configured"),
        )
    })?;

    let constraints = store.load_constraints(&strategy_id).await?;
    Ok(Json(ApiResponse::success(constraints)))
}
