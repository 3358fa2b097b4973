//! Per-user favorite ordering rows
//!
//! display_order is dense and zero-based within a user's set after every
//! committed mutation; created_at ascending breaks ties while a
//! transaction is mid-flight.

use skywatch_common::db::models::FavoriteLocation;
use skywatch_common::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};

const FAVORITE_COLUMNS: &str = r#"
    SELECT
        l.location_id,
        l.name AS city_name,
        l.country_code,
        l.latitude,
        l.longitude,
        ufl.display_order,
        ufl.created_at
    FROM locations l
    JOIN user_favorite_locations ufl ON l.location_id = ufl.location_id
"#;

/// A user's favorites ordered by display_order, then created_at
pub async fn list_favorites(db: &SqlitePool, user_id: &str) -> Result<Vec<FavoriteLocation>> {
    let query = format!(
        "{} WHERE ufl.user_id = ? ORDER BY ufl.display_order ASC, ufl.created_at ASC",
        FAVORITE_COLUMNS
    );
    let rows = sqlx::query_as::<_, FavoriteLocation>(&query)
        .bind(user_id)
        .fetch_all(db)
        .await?;

    Ok(rows)
}

/// A single favorite joined with its catalog entry
pub async fn get_favorite(
    db: &SqlitePool,
    user_id: &str,
    location_id: i64,
) -> Result<Option<FavoriteLocation>> {
    let query = format!("{} WHERE ufl.user_id = ? AND l.location_id = ?", FAVORITE_COLUMNS);
    let row = sqlx::query_as::<_, FavoriteLocation>(&query)
        .bind(user_id)
        .bind(location_id)
        .fetch_optional(db)
        .await?;

    Ok(row)
}

/// Same as [`get_favorite`], inside an open transaction
///
/// Used by Add to return the row it just inserted without leaving the
/// write path.
pub async fn get_favorite_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    location_id: i64,
) -> Result<Option<FavoriteLocation>> {
    let query = format!("{} WHERE ufl.user_id = ? AND l.location_id = ?", FAVORITE_COLUMNS);
    let row = sqlx::query_as::<_, FavoriteLocation>(&query)
        .bind(user_id)
        .bind(location_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row)
}

/// Highest display_order in the user's set; -1 when empty
///
/// The next free slot is always max + 1.
pub async fn max_display_order(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> Result<i64> {
    let max: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(display_order), -1) FROM user_favorite_locations WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(max)
}

pub async fn insert_favorite(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    location_id: i64,
    display_order: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_favorite_locations (user_id, location_id, display_order)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(location_id)
    .bind(display_order)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Delete one favorite row; returns rows affected (0 when absent)
pub async fn delete_favorite(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    location_id: i64,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM user_favorite_locations WHERE user_id = ? AND location_id = ?",
    )
    .bind(user_id)
    .bind(location_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

pub async fn set_display_order(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    location_id: i64,
    new_order: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE user_favorite_locations SET display_order = ? WHERE user_id = ? AND location_id = ?",
    )
    .bind(new_order)
    .bind(user_id)
    .bind(location_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Remaining (location_id, display_order) pairs in current order
///
/// Feeds compaction after a removal; ordering matches the list read so
/// compaction preserves the user's sequence.
pub async fn ordered_location_ids(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
) -> Result<Vec<(i64, i64)>> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT location_id, display_order
        FROM user_favorite_locations
        WHERE user_id = ?
        ORDER BY display_order ASC, created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Flip the negative temporaries written by the reorder pass back into
/// final non-negative orders
pub async fn finalize_reorder(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE user_favorite_locations
        SET display_order = -display_order - 1
        WHERE user_id = ? AND display_order < 0
        "#,
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
