//! Database migration command.
//!
//! ```bash
//! tienda migrate
//! ```
//!
//! Reads `TIENDA_DATABASE_URL` (or `DATABASE_URL`). Migrations live in
//! `crates/storefront/migrations/` and are embedded at build time.

use super::{CommandError, connect};

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
