//! Shared location catalog operations
//!
//! Catalog rows are deduplicated by (name, country_code) and shared by
//! every user that favorites the city. Only the favorites engine mutates
//! this table, always inside a transaction.

use skywatch_common::Result;
use sqlx::{Sqlite, Transaction};

/// Exact-match catalog lookup
pub async fn find_location(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    country_code: &str,
) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar(
        "SELECT location_id FROM locations WHERE name = ? AND country_code = ?",
    )
    .bind(name)
    .bind(country_code)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(id)
}

/// Insert a new catalog row and return its id
///
/// A concurrent insert of the same (name, country_code) pair surfaces as
/// a unique violation; the caller re-runs [`find_location`] and treats
/// the winner's row as found.
pub async fn create_location(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    country_code: &str,
    latitude: f64,
    longitude: f64,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO locations (name, country_code, latitude, longitude)
        VALUES (?, ?, ?, ?)
        RETURNING location_id
        "#,
    )
    .bind(name)
    .bind(country_code)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Number of favorites (across all users) still referencing a location
pub async fn count_location_refs(
    tx: &mut Transaction<'_, Sqlite>,
    location_id: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_favorite_locations WHERE location_id = ?",
    )
    .bind(location_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Delete a catalog row; derived weather rows cascade via foreign keys
pub async fn delete_location(tx: &mut Transaction<'_, Sqlite>, location_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM locations WHERE location_id = ?")
        .bind(location_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
