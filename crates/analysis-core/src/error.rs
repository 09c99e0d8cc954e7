use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComplexityError {
    #[error("Insufficient data for {timeframe}: {reason}")]
    InsufficientData { timeframe: String, reason: String },

    #[error("Data quality issue: {0}")]
    DataQualityIssue(String),

    #[error("Conflicting constraints: {0}")]
    ConflictingConstraints(String),

    #[error("Constraint impossible: {0}")]
    ConstraintImpossible(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Optimization timed out after {seconds}s")]
    OptimizationTimeout { seconds: u64 },

    #[error("Calculation error: {0}")]
    CalculationError(String),

    /// Market data or constraint storage could not be read.
    #[error("Data source error: {0}")]
    DataSource(String),
}

/// User-facing explanation of an error plus what to try next.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorGuidance {
    pub code: &'static str,
    pub message: &'static str,
    pub suggestions: &'static [&'static str],
}

impl ComplexityError {
    pub fn insufficient(timeframe: impl Into<String>, reason: impl Into<String>) -> Self {
        ComplexityError::InsufficientData {
            timeframe: timeframe.into(),
            reason: reason.into(),
        }
    }

    /// Validation errors stop processing of the affected unit of work;
    /// they are never silently replaced by a score.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ComplexityError::InsufficientData { .. }
                | ComplexityError::DataQualityIssue(_)
                | ComplexityError::ConflictingConstraints(_)
                | ComplexityError::ConstraintImpossible(_)
                | ComplexityError::InvalidParameter(_)
        )
    }

    pub fn guidance(&self) -> ErrorGuidance {
        match self {
            ComplexityError::InsufficientData { .. } => ErrorGuidance {
                code: "INSUFFICIENT_DATA",
                message: "Not enough historical data to score this strategy reliably.",
                suggestions: &[
                    "Increase the lookback period",
                    "Use a longer timeframe with more history available",
                    "Check that the data source covers the requested range",
                ],
            },
            ComplexityError::DataQualityIssue(_) => ErrorGuidance {
                code: "DATA_QUALITY_ISSUE",
                message: "The return series contains gaps, invalid values or unordered timestamps.",
                suggestions: &[
                    "Remove or fill missing values before submitting",
                    "Make sure timestamps are strictly increasing",
                ],
            },
            ComplexityError::ConflictingConstraints(_) => ErrorGuidance {
                code: "CONFLICTING_CONSTRAINTS",
                message: "The constraint set contradicts itself.",
                suggestions: &[
                    "Make sure the maximum complexity is not below the minimum complexity",
                    "Remove one of the conflicting constraints",
                ],
            },
            ComplexityError::ConstraintImpossible(_) => ErrorGuidance {
                code: "CONSTRAINT_IMPOSSIBLE",
                message: "A hard constraint is almost certainly unattainable.",
                suggestions: &[
                    "Relax the threshold of the hard constraint",
                    "Mark the constraint as soft so it only penalizes the score",
                ],
            },
            ComplexityError::InvalidParameter(_) => ErrorGuidance {
                code: "INVALID_PARAMETER",
                message: "A request parameter is outside its allowed range.",
                suggestions: &[
                    "Check the constraint value against its allowed range",
                    "Use one of the supported operators: <, <=, >, >=, ==",
                ],
            },
            ComplexityError::OptimizationTimeout { .. } => ErrorGuidance {
                code: "OPTIMIZATION_TIMEOUT",
                message: "The optimization did not finish in time.",
                suggestions: &[
                    "Request fewer timeframes",
                    "Reduce the lookback period",
                    "Retry later when the service is less busy",
                ],
            },
            ComplexityError::CalculationError(_) => ErrorGuidance {
                code: "CALCULATION_ERROR",
                message: "An unexpected numeric failure occurred while scoring.",
                suggestions: &[
                    "Retry the request",
                    "Verify the input series contains realistic values",
                ],
            },
            ComplexityError::DataSource(_) => ErrorGuidance {
                code: "DATA_SOURCE_ERROR",
                message: "An upstream data source could not be read.",
                suggestions: &[
                    "Retry the request",
                    "Supply the return series inline",
                ],
            },
        }
    }
}
