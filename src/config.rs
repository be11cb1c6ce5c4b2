//! Environment configuration
//!
//! The engine takes a single variable, `DB_URL`, holding the sqlx
//! connection string for the fingerprint index
//! (e.g. `sqlite://waveprint.db?mode=rwc`). Absence is fatal at startup.

use crate::error::{Error, Result};
use tracing::info;

/// Name of the environment variable holding the database URL
pub const DB_URL_VAR: &str = "DB_URL";

/// Resolved engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx connection string for the fingerprint index
    pub db_url: String,
}

impl Config {
    /// Resolve configuration from the environment.
    ///
    /// # Errors
    /// `Error::Config` when `DB_URL` is unset or empty.
    pub fn from_env() -> Result<Self> {
        let db_url = std::env::var(DB_URL_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{DB_URL_VAR} must be set to a database connection string"
                ))
            })?;

        info!("Database URL loaded from environment");
        Ok(Self { db_url })
    }
}
