//! Favorite-locations request handlers
//!
//! Validates request shape, invokes the favorites engine, shapes the
//! response, and dispatches the post-commit side effects (enrichment
//! trigger, favorites broadcast). Side effects are spawned after the
//! transaction committed and can never fail the primary result.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skywatch_common::db::models::FavoriteLocation;
use skywatch_common::events::SkywatchEvent;
use skywatch_common::Error;
use tracing::{info, warn};

use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::enrichment::EnrichmentRequest;
use crate::favorites::NewFavorite;
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of POST /locations
///
/// Clients send either camelCase or snake_case field names; the aliases
/// normalize both to one canonical shape before the engine sees it.
#[derive(Debug, Deserialize)]
pub struct AddLocationRequest {
    #[serde(alias = "cityName")]
    pub city_name: String,
    #[serde(alias = "countryCode")]
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Explicit position for legacy callers; omitted means append
    #[serde(default, alias = "displayOrder")]
    pub display_order: Option<i64>,
}

impl AddLocationRequest {
    fn into_new_favorite(self) -> NewFavorite {
        NewFavorite {
            city_name: self.city_name,
            country_code: self.country_code,
            latitude: self.latitude,
            longitude: self.longitude,
            display_order: self.display_order,
        }
    }
}

/// Body of PUT /locations/order
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(alias = "location_order")]
    #[serde(rename = "locationOrder")]
    pub location_order: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /locations - the user's favorites in display order
pub async fn get_user_locations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<FavoriteLocation>>, ApiError> {
    let favorites = state.favorites.list(&user.user_id).await?;
    Ok(Json(favorites))
}

/// GET /locations/:id - a single favorite
pub async fn get_location(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(location_id): Path<i64>,
) -> Result<Json<FavoriteLocation>, ApiError> {
    let favorite = state
        .favorites
        .get(&user.user_id, location_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("location {} is not a favorite", location_id)))?;

    Ok(Json(favorite))
}

/// POST /locations - add a favorite
pub async fn add_location(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<FavoriteLocation>), ApiError> {
    let request: AddLocationRequest = serde_json::from_value(body)
        .map_err(|e| Error::Validation(format!("malformed location body: {}", e)))?;

    if request.city_name.trim().is_empty() || request.country_code.trim().is_empty() {
        return Err(Error::Validation("city name and country code are required".to_string()).into());
    }

    let outcome = state
        .favorites
        .add(&user.user_id, &request.into_new_favorite())
        .await?;

    info!(
        user_id = %user.user_id,
        location_id = outcome.favorite.location_id,
        city = %outcome.favorite.city_name,
        new_location = outcome.created_location,
        "favorite added"
    );

    if outcome.created_location {
        state
            .enrichment
            .trigger(EnrichmentRequest::from(&outcome.favorite));
        let _ = state.events.emit(SkywatchEvent::LocationCreated {
            location_id: outcome.favorite.location_id,
            city_name: outcome.favorite.city_name.clone(),
            country_code: outcome.favorite.country_code.clone(),
            timestamp: chrono::Utc::now(),
        });
    }
    broadcast_favorites(state, user.user_id);

    Ok((StatusCode::CREATED, Json(outcome.favorite)))
}

/// DELETE /locations/:id - remove a favorite
///
/// Removing an id that is not in the user's list still answers success.
pub async fn remove_location(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(location_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = state.favorites.remove(&user.user_id, location_id).await?;

    if outcome.removed {
        info!(
            user_id = %user.user_id,
            location_id,
            collected = outcome.collected_location,
            "favorite removed"
        );
        broadcast_favorites(state, user.user_id);
    }

    Ok(Json(MessageResponse {
        message: "Location deleted successfully".to_string(),
    }))
}

/// PUT /locations/order - apply a full reordering
pub async fn update_location_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: ReorderRequest = serde_json::from_value(body).map_err(|e| {
        Error::Validation(format!("locationOrder must be an array of location ids: {}", e))
    })?;

    state
        .favorites
        .reorder(&user.user_id, &request.location_order)
        .await?;

    info!(
        user_id = %user.user_id,
        count = request.location_order.len(),
        "favorites reordered"
    );

    Ok(Json(MessageResponse {
        message: "Location order updated successfully".to_string(),
    }))
}

/// Fallback for unmatched method/path combinations
pub async fn not_found() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse {
            message: "Not Found".to_string(),
        }),
    )
}

// ============================================================================
// Side effects
// ============================================================================

/// Push the refreshed list to the user's live sessions
///
/// Spawned after commit; reads through the primary pool so the refetch
/// sees the write it follows. Failures are logged, never surfaced.
fn broadcast_favorites(state: AppState, user_id: String) {
    tokio::spawn(async move {
        match state.favorites.list_primary(&user_id).await {
            Ok(favorites) => {
                let _ = state.events.emit(SkywatchEvent::FavoritesChanged {
                    user_id,
                    favorites,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                warn!(user_id = %user_id, "favorites broadcast refetch failed: {}", e);
            }
        }
    });
}
