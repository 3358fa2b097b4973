//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently
//! on every start. Foreign keys are enforced so that deleting a catalog
//! row cascades through its derived weather data.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize the primary (write-capable) connection pool and schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    init_schema(&pool).await?;

    Ok(pool)
}

/// Open a second, read-only pool over the same database file
///
/// Stands in for a read replica: list reads scale independently of the
/// write path, with no consistency guarantee against a write committed
/// a moment earlier on the primary pool.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await?;

    // Readers must still honor the write path's WAL journal
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    // Cascade deletes from locations into derived tables
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Create all tables and indexes if needed (idempotent)
///
/// Exposed separately from [`init_database`] so tests can lay the schema
/// over an in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_locations_table(pool).await?;
    create_user_favorite_locations_table(pool).await?;
    create_weather_cache_table(pool).await?;
    create_location_forecasts_table(pool).await?;

    Ok(())
}

/// Create the shared location catalog
///
/// One row per (name, country_code) pair, shared by every user that
/// favorites the city. Rows are immutable once created and are deleted
/// only when the last referencing favorite disappears.
async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            location_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country_code TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (name, country_code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the per-user favorites join/ordering table
///
/// display_order is dense and zero-based within a user's set after every
/// committed mutation. The (user_id, display_order) uniqueness turns a
/// concurrent-add race on the next order into a retryable conflict.
/// No non-negativity CHECK: reordering passes through negative
/// temporaries inside its transaction.
async fn create_user_favorite_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_favorite_locations (
            user_id TEXT NOT NULL,
            location_id INTEGER NOT NULL REFERENCES locations(location_id) ON DELETE CASCADE,
            display_order INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, location_id),
            UNIQUE (user_id, display_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ufl_location ON user_favorite_locations(location_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the current-conditions cache, one row per location
async fn create_weather_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_cache (
            location_id INTEGER PRIMARY KEY REFERENCES locations(location_id) ON DELETE CASCADE,
            payload TEXT NOT NULL,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the forecast rows filled in by the enrichment service
async fn create_location_forecasts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS location_forecasts (
            forecast_id INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id INTEGER NOT NULL REFERENCES locations(location_id) ON DELETE CASCADE,
            forecast_time TIMESTAMP NOT NULL,
            temperature_c REAL,
            condition TEXT,
            payload TEXT,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_forecasts_location ON location_forecasts(location_id, forecast_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
