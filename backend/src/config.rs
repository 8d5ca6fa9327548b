//! Runtime settings loaded via OrthoConfig.
//!
//! Values come from `LMS_*` environment variables or a configuration file.
//! The command line is left to the `lms-progress` subcommands, so settings
//! are loaded with the program name alone.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::outbound::persistence::PoolConfig;

const PROGRAM_NAME: &str = "lms-progress";

/// Errors raised while turning settings into runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// The settings sources could not be read.
    #[error("failed to load settings: {message}")]
    Load { message: String },
    /// A database command ran without `LMS_DATABASE_URL`.
    #[error("LMS_DATABASE_URL must be set")]
    MissingDatabaseUrl,
}

/// Settings for the progress engine binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "LMS")]
pub struct LmsSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Idle connections kept open.
    #[ortho_config(default = 2)]
    pub pool_min_idle: u32,
    /// Seconds to wait for a pooled connection.
    #[ortho_config(default = 30)]
    pub pool_timeout_secs: u64,
    /// Emit logs as JSON lines.
    #[ortho_config(default = false)]
    pub log_json: bool,
}

impl LmsSettings {
    /// Load settings from the environment and configuration files only.
    pub fn from_environment() -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from(PROGRAM_NAME)]).map_err(|err| SettingsError::Load {
            message: err.to_string(),
        })
    }

    /// Pool configuration for the configured database.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let url = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)?;
        Ok(PoolConfig::new(url)
            .with_max_size(self.pool_max_size)
            .with_min_idle(Some(self.pool_min_idle))
            .with_connection_timeout(Duration::from_secs(self.pool_timeout_secs)))
    }
}
