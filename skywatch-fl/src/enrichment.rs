//! Enrichment trigger client
//!
//! When an add puts a brand-new city into the catalog, the weather-data
//! service is asked to start fetching forecasts for it. The call is
//! fire-and-forget: it runs after the transaction committed, never blocks
//! the response, and its failures are logged and swallowed.

use serde::Serialize;
use skywatch_common::db::models::FavoriteLocation;
use std::time::Duration;
use tracing::{debug, warn};

/// Payload posted to the enrichment endpoint
#[derive(Debug, Serialize)]
pub struct EnrichmentRequest {
    pub location_id: i64,
    pub name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&FavoriteLocation> for EnrichmentRequest {
    fn from(favorite: &FavoriteLocation) -> Self {
        Self {
            location_id: favorite.location_id,
            name: favorite.city_name.clone(),
            country_code: favorite.country_code.clone(),
            latitude: favorite.latitude,
            longitude: favorite.longitude,
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentClient {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl EnrichmentClient {
    /// Build the client; `endpoint = None` turns the trigger into a no-op
    pub fn new(endpoint: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http, endpoint }
    }

    /// Ask the weather-data service to start enriching a new location
    ///
    /// Errors are reported to the caller only so it can log them; nothing
    /// downstream depends on the outcome.
    pub async fn notify_new_location(&self, request: &EnrichmentRequest) -> reqwest::Result<()> {
        let Some(endpoint) = &self.endpoint else {
            debug!(
                location_id = request.location_id,
                "enrichment endpoint not configured, skipping trigger"
            );
            return Ok(());
        };

        self.http
            .post(endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        debug!(
            location_id = request.location_id,
            city = %request.name,
            "enrichment trigger delivered"
        );
        Ok(())
    }

    /// Spawn the trigger as a detached task
    pub fn trigger(&self, request: EnrichmentRequest) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.notify_new_location(&request).await {
                warn!(
                    location_id = request.location_id,
                    "enrichment trigger failed: {}", e
                );
            }
        });
    }
}
