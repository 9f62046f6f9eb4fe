//! Core configuration types for the reeltrack services.
//!
//! Both binaries (worker and admin server) load a single [`AppConfig`]
//! from the environment at startup and fail fast on anything missing or
//! malformed.

mod app_config;
mod config;

pub use app_config::{AppConfig, Credentials};
pub use config::{load_app_config, load_app_config_from_env};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error(
        "no upstream credentials configured: set SESSION_TOKEN, or both USERNAME and PASSWORD"
    )]
    MissingCredentials,
}
