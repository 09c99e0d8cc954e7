//! Read-only access to saved per-strategy constraint definitions.

use std::collections::HashMap;
use std::str::FromStr;

use analysis_core::{
    ComplexityError, Constraint, ConstraintOperator, ConstraintStore, ConstraintType,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

#[derive(Debug, sqlx::FromRow)]
struct ConstraintRow {
    constraint_type: String,
    operator: Option<String>,
    value: f64,
    is_hard: i64,
    weight: Option<f64>,
}

impl TryFrom<ConstraintRow> for Constraint {
    type Error = ComplexityError;

    fn try_from(row: ConstraintRow) -> Result<Self, Self::Error> {
        let operator = match row.operator.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(op) => Some(ConstraintOperator::from_str(op)?),
        };
        Ok(Constraint {
            constraint_type: ConstraintType::from_str(&row.constraint_type)?,
            operator,
            value: row.value,
            is_hard: row.is_hard != 0,
            weight: row.weight.unwrap_or(1.0),
        })
    }
}

/// Loads constraints from the `strategy_constraints` table. The schema is
/// owned by the strategy service; this store never writes.
#[derive(Clone)]
pub struct SqliteConstraintStore {
    pool: SqlitePool,
}

impl SqliteConstraintStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConstraintStore for SqliteConstraintStore {
    async fn load_constraints(&self, strategy_id: &str) -> Result<Vec<Constraint>, ComplexityError> {
        let rows = sqlx::query_as::<_, ConstraintRow>(
            "SELECT constraint_type, operator, value, is_hard, weight
             FROM strategy_constraints
             WHERE strategy_id = ?
             ORDER BY id",
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ComplexityError::DataSource(e.to_string()))?;

        let mut constraints = Vec::with_capacity(rows.len());
        for row in rows {
            match Constraint::try_from(row) {
                Ok(c) => constraints.push(c),
                Err(e) => warn!("Skipping stored constraint for {}: {}", strategy_id, e),
            }
        }

        debug!("Loaded {} constraints for {}", constraints.len(), strategy_id);
        Ok(constraints)
    }
}

/// Constraint sets held in memory, keyed by strategy id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConstraintStore {
    constraints: HashMap<String, Vec<Constraint>>,
}

impl InMemoryConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy_id: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        self.constraints.insert(strategy_id.into(), constraints);
        self
    }
}

#[async_trait]
impl ConstraintStore for InMemoryConstraintStore {
    async fn load_constraints(&self, strategy_id: &str) -> Result<Vec<Constraint>, ComplexityError> {
        Ok(self.constraints.get(strategy_id).cloned().unwrap_or_default())
    }
}
