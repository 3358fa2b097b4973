//! Event types for the SkyWatch event system
//!
//! Provides shared event definitions and the EventBus used to push
//! favorites updates to connected sessions.

use crate::db::models::FavoriteLocation;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// SkyWatch event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE
/// transmission to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SkywatchEvent {
    /// A user's favorites list changed (add or remove committed)
    ///
    /// Carries the full refreshed list so sessions can replace their view
    /// without a follow-up fetch.
    FavoritesChanged {
        user_id: String,
        favorites: Vec<FavoriteLocation>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A brand-new location entered the shared catalog
    ///
    /// Emitted alongside the enrichment trigger; lets dashboards show
    /// "warming up" state for a city with no weather data yet.
    LocationCreated {
        location_id: i64,
        city_name: String,
        country_code: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SkywatchEvent {
    /// The user a targeted event belongs to, if any
    ///
    /// Catalog-level events return `None` and are visible to every
    /// subscriber.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SkywatchEvent::FavoritesChanged { user_id, .. } => Some(user_id),
            SkywatchEvent::LocationCreated { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SkywatchEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SkywatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the subscriber count, or an error when nobody is
    /// listening; callers treat both as success.
    pub fn emit(
        &self,
        event: SkywatchEvent,
    ) -> Result<usize, Box<broadcast::error::SendError<SkywatchEvent>>> {
        self.tx.send(event).map_err(Box::new)
    }
}
