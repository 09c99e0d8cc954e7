pub mod analyzer;
pub mod constraints;
pub mod fallback;
pub mod metrics;
pub mod scorer;
pub mod store;
pub mod validation;

pub use analyzer::ComplexityAnalyzer;
pub use constraints::{complexity_bounds, feasible_complexity_bounds, ConstraintEngine};
pub use fallback::{FallbackComplexityScorer, FALLBACK_MAX_CONFIDENCE};
pub use metrics::{MetricsCalculator, RATIO_CAP, TRADING_DAYS_PER_YEAR};
pub use scorer::{level_description, ComplexityScorer, MAX_LEVEL, MIN_LEVEL};
pub use store::{InMemoryConstraintStore, SqliteConstraintStore};
pub use validation::{validate_return_series, ConstraintValidator};
