//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's favorite joined with its catalog entry
///
/// Serialized shape matches the wire format expected by clients:
/// the catalog name travels as `city_name`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FavoriteLocation {
    pub location_id: i64,
    pub city_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}
