//! Favorites ordering engine
//!
//! Keeps each user's display_order sequence dense and zero-based across
//! adds, removals, and arbitrary reordering. Every mutating operation is
//! one transaction: partial application is never observable, and a
//! dropped transaction rolls back on any error path.

use crate::db::{favorites, locations};
use skywatch_common::db::models::FavoriteLocation;
use skywatch_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Attempts per add when racing another session for the next display_order
const MAX_ORDER_RETRIES: u32 = 3;

/// Input to [`FavoritesService::add`], already normalized by the boundary
#[derive(Debug, Clone)]
pub struct NewFavorite {
    pub city_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Explicit position for legacy callers; the default path computes
    /// max + 1
    pub display_order: Option<i64>,
}

/// Result of an add
#[derive(Debug)]
pub struct AddOutcome {
    pub favorite: FavoriteLocation,
    /// True when a brand-new catalog row was created (drives the
    /// enrichment trigger); false on reuse of an existing city
    pub created_location: bool,
}

/// Result of a remove
#[derive(Debug)]
pub struct RemoveOutcome {
    /// False when the favorite was not present (idempotent no-op)
    pub removed: bool,
    /// True when the catalog row lost its last reference and was
    /// garbage-collected along with its derived weather rows
    pub collected_location: bool,
}

/// The four favorites operations over the location store
///
/// Holds both pools: mutations and their dependent reads go through the
/// primary, standalone list reads through the read-only pool.
#[derive(Clone)]
pub struct FavoritesService {
    db: SqlitePool,
    read_db: SqlitePool,
}

impl FavoritesService {
    pub fn new(db: SqlitePool, read_db: SqlitePool) -> Self {
        Self { db, read_db }
    }

    /// A user's favorites in display order (read-only path)
    pub async fn list(&self, user_id: &str) -> Result<Vec<FavoriteLocation>> {
        favorites::list_favorites(&self.read_db, user_id).await
    }

    /// Same list through the primary pool, for read-your-write consumers
    /// (the post-commit broadcast refetch)
    pub async fn list_primary(&self, user_id: &str) -> Result<Vec<FavoriteLocation>> {
        favorites::list_favorites(&self.db, user_id).await
    }

    /// A single favorite (read-only path)
    pub async fn get(&self, user_id: &str, location_id: i64) -> Result<Option<FavoriteLocation>> {
        favorites::get_favorite(&self.read_db, user_id, location_id).await
    }

    /// Add a favorite, reusing or creating the shared catalog row
    ///
    /// An auto-assigned order that loses the (user_id, display_order)
    /// uniqueness race is retried with a freshly computed order. An
    /// explicitly seeded order is inserted verbatim and its conflicts
    /// propagate.
    pub async fn add(&self, user_id: &str, request: &NewFavorite) -> Result<AddOutcome> {
        let mut attempt = 1;
        loop {
            match self.try_add(user_id, request).await {
                Err(e)
                    if e.is_unique_violation()
                        && request.display_order.is_none()
                        && attempt < MAX_ORDER_RETRIES =>
                {
                    debug!(
                        user_id,
                        attempt, "display_order conflict on add, retrying with recomputed order"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_add(&self, user_id: &str, request: &NewFavorite) -> Result<AddOutcome> {
        let mut tx = self.db.begin().await?;

        // Resolve the catalog entry: reuse if the city is known, create
        // otherwise. A lost creation race means someone else just created
        // it; re-look it up and treat as found.
        let (location_id, created_location) =
            match locations::find_location(&mut tx, &request.city_name, &request.country_code)
                .await?
            {
                Some(id) => (id, false),
                None => {
                    match locations::create_location(
                        &mut tx,
                        &request.city_name,
                        &request.country_code,
                        request.latitude,
                        request.longitude,
                    )
                    .await
                    {
                        Ok(id) => (id, true),
                        Err(e) if e.is_unique_violation() => {
                            let id = locations::find_location(
                                &mut tx,
                                &request.city_name,
                                &request.country_code,
                            )
                            .await?
                            .ok_or_else(|| {
                                Error::Internal(
                                    "catalog row missing after duplicate insert".to_string(),
                                )
                            })?;
                            debug!(location_id = id, "lost catalog creation race, reusing row");
                            (id, false)
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

        // Already favorited: return the existing row untouched
        if let Some(existing) = favorites::get_favorite_tx(&mut tx, user_id, location_id).await? {
            tx.commit().await?;
            return Ok(AddOutcome {
                favorite: existing,
                created_location: false,
            });
        }

        let display_order = match request.display_order {
            Some(order) => order,
            None => favorites::max_display_order(&mut tx, user_id).await? + 1,
        };

        favorites::insert_favorite(&mut tx, user_id, location_id, display_order).await?;

        let favorite = favorites::get_favorite_tx(&mut tx, user_id, location_id)
            .await?
            .ok_or_else(|| Error::Internal("favorite missing after insert".to_string()))?;

        tx.commit().await?;

        Ok(AddOutcome {
            favorite,
            created_location,
        })
    }

    /// Remove a favorite, recompact the survivors, and garbage-collect
    /// the catalog row when nobody references it anymore
    ///
    /// Removing an id that is not in the user's list is a no-op success.
    pub async fn remove(&self, user_id: &str, location_id: i64) -> Result<RemoveOutcome> {
        let mut tx = self.db.begin().await?;

        if favorites::delete_favorite(&mut tx, user_id, location_id).await? == 0 {
            tx.commit().await?;
            return Ok(RemoveOutcome {
                removed: false,
                collected_location: false,
            });
        }

        // Compaction: reassign 0..N-1 in the surviving order. Ascending
        // assignment never trips the uniqueness constraint because each
        // target slot was vacated by the deletion or by the previous
        // iteration.
        let remaining = favorites::ordered_location_ids(&mut tx, user_id).await?;
        for (index, (remaining_id, current_order)) in remaining.iter().enumerate() {
            let target = index as i64;
            if *current_order != target {
                favorites::set_display_order(&mut tx, user_id, *remaining_id, target).await?;
            }
        }

        let collected_location = if locations::count_location_refs(&mut tx, location_id).await? == 0
        {
            locations::delete_location(&mut tx, location_id).await?;
            true
        } else {
            false
        };

        tx.commit().await?;

        Ok(RemoveOutcome {
            removed: true,
            collected_location,
        })
    }

    /// Apply a full reordering of the user's favorites
    ///
    /// The supplied ids must be an exact permutation of the current set;
    /// anything else (missing, extra, duplicated ids) is a validation
    /// error. Index i in the array becomes display_order i.
    pub async fn reorder(&self, user_id: &str, location_ids: &[i64]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let current = favorites::ordered_location_ids(&mut tx, user_id).await?;
        let mut expected: Vec<i64> = current.iter().map(|(id, _)| *id).collect();
        let mut supplied: Vec<i64> = location_ids.to_vec();
        expected.sort_unstable();
        supplied.sort_unstable();
        if expected != supplied {
            return Err(Error::Validation(
                "location order must list each current favorite exactly once".to_string(),
            ));
        }

        // Two-phase assignment under the uniqueness constraint: park every
        // row at a negative temporary, then flip all temporaries to their
        // final 0..N-1 values in one statement.
        for (index, id) in location_ids.iter().enumerate() {
            favorites::set_display_order(&mut tx, user_id, *id, -(index as i64) - 1).await?;
        }
        favorites::finalize_reorder(&mut tx, user_id).await?;

        tx.commit().await?;

        Ok(())
    }
}
