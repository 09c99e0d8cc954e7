use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite URL of the saved constraint definitions, if any
    pub database_url: Option<String>,
    pub risk_free_rate: f64,
    pub optimization_timeout_secs: u64,
    pub max_timeframes: usize,
    /// Number of strategies whose latest optimization result is kept
    pub result_cache_size: usize,
    pub enable_hsts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            risk_free_rate: 0.02,
            optimization_timeout_secs: 30,
            max_timeframes: 9,
            result_cache_size: 256,
            enable_hsts: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("API_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            risk_free_rate: env::var("RISK_FREE_RATE")
                .unwrap_or_else(|_| "0.02".to_string())
                .parse()
                .context("RISK_FREE_RATE must be a number")?,
            optimization_timeout_secs: env::var("OPTIMIZATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("OPTIMIZATION_TIMEOUT_SECS must be a whole number of seconds")?,
            max_timeframes: env::var("MAX_TIMEFRAMES")
                .unwrap_or_else(|_| "9".to_string())
                .parse()?,
            result_cache_size: env::var("RESULT_CACHE_SIZE")
                .unwrap_or_else(|_| "256".to_string())
                .parse()?,
            enable_hsts: env::var("ENABLE_HSTS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() || self.risk_free_rate.abs() > 1.0 {
            bail!("RISK_FREE_RATE must be between -1.0 and 1.0, got {}", self.risk_free_rate);
        }
        if self.optimization_timeout_secs == 0 {
            bail!("OPTIMIZATION_TIMEOUT_SECS must be at least 1");
        }
        if self.max_timeframes == 0 {
            bail!("MAX_TIMEFRAMES must be at least 1");
        }
        if self.result_cache_size == 0 {
            bail!("RESULT_CACHE_SIZE must be at least 1");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn optimization_timeout(&self) -> Duration {
        Duration::from_secs(self.optimization_timeout_secs)
    }
}
