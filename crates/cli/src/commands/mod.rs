//! Subcommand implementations.

pub mod coupon;
pub mod correo;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use tienda_storefront::config::{self, ConfigError};

/// Errors shared by the subcommands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] tienda_storefront::db::RepositoryError),

    #[error(transparent)]
    Correo(#[from] tienda_correo::CorreoError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{} validation error(s):\n  - {}", .0.len(), .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Invalid(String),
}

/// Connect to the storefront database.
async fn connect() -> Result<PgPool, CommandError> {
    let database_url: SecretString = config::database_url_from_env()?;
    tracing::info!("Connecting to storefront database...");
    Ok(tienda_storefront::db::create_pool(&database_url).await?)
}
