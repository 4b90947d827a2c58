//! Database initialization
//!
//! Creates the database file and schema on first run so the service starts
//! without any manual setup. Safe to call against an existing database.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while a submission is being written
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Wait briefly on a locked database instead of failing outright
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation is idempotent - safe to call multiple times
    create_leads_table(&pool).await?;
    create_partial_qualifications_table(&pool).await?;

    Ok(pool)
}

/// Create the leads table
///
/// `email` is the natural key; re-submissions upsert against it so at most
/// one durable row exists per visitor.
pub async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            email TEXT PRIMARY KEY,
            phone TEXT NOT NULL,
            is_programmer INTEGER NOT NULL,
            utm_source TEXT NOT NULL DEFAULT 'direct',
            utm_medium TEXT NOT NULL DEFAULT 'not_set',
            utm_campaign TEXT NOT NULL DEFAULT 'not_set',
            ip_address TEXT,
            user_agent TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the partial_qualifications table
///
/// Keyed by the client-generated session id; repeat answers for the same
/// session overwrite the earlier row.
pub async fn create_partial_qualifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS partial_qualifications (
            session_id TEXT PRIMARY KEY,
            is_programmer INTEGER NOT NULL,
            utm_source TEXT NOT NULL DEFAULT 'direct',
            utm_medium TEXT NOT NULL DEFAULT 'not_set',
            utm_campaign TEXT NOT NULL DEFAULT 'not_set',
            ip_address TEXT,
            user_agent TEXT,
            captured_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
