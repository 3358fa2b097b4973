//! skywatch-fl library - Favorite Locations service
//!
//! Authenticated users maintain an ordered list of favorite cities.
//! The router, application state, and CORS policy live here; the
//! ordering logic is in [`favorites`], persistence in [`db`].

use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tracing::warn;

use skywatch_common::api::auth::TokenVerifier;
use skywatch_common::config::ServiceConfig;
use skywatch_common::events::EventBus;

pub mod api;
pub mod db;
pub mod enrichment;
pub mod favorites;

use enrichment::EnrichmentClient;
use favorites::FavoritesService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The favorites ordering engine over both pools
    pub favorites: FavoritesService,
    /// Bearer-token verification
    pub verifier: TokenVerifier,
    /// Push channel to connected sessions
    pub events: EventBus,
    /// Fire-and-forget trigger for new catalog rows
    pub enrichment: EnrichmentClient,
    /// CORS origin; `"*"` means permissive
    pub allowed_origin: String,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, read_db: SqlitePool, config: &ServiceConfig) -> Self {
        Self {
            favorites: FavoritesService::new(db, read_db),
            verifier: TokenVerifier::new(&config.jwt_secret),
            events: EventBus::new(1000),
            enrichment: EnrichmentClient::new(config.enrichment_url.clone()),
            allowed_origin: config.allowed_origin.clone(),
        }
    }
}

/// Build application router
///
/// All `/locations*` routes and the event stream require authentication;
/// `/health` does not. CORS headers are attached to every response,
/// errors included.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, put};

    let protected = Router::new()
        .route(
            "/locations",
            get(api::get_user_locations).post(api::add_location),
        )
        .route("/locations/order", put(api::update_location_order))
        .route(
            "/locations/:id",
            get(api::get_location).delete(api::remove_location),
        )
        .route("/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = api::health_routes();

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback(api::not_found)
        .layer(cors_layer(&state.allowed_origin))
        .layer(middleware::from_fn(preflight_no_content))
        .with_state(state)
}

/// Answer OPTIONS invocations with an empty 204
///
/// The CORS layer underneath short-circuits every OPTIONS request itself,
/// attaching the allow headers but answering 200; the documented contract
/// is 204 with no body. Only a clean 200 is rewritten, so a failure
/// escaping the CORS layer keeps its status.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// CORS policy from the configured origin
///
/// A concrete origin gets credentials and the standard verb/header set;
/// `"*"` (or an unparsable origin) degrades to the permissive layer,
/// which cannot carry credentials.
fn cors_layer(allowed_origin: &str) -> CorsLayer {
    if allowed_origin == "*" {
        return CorsLayer::permissive();
    }

    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static("x-requested-with"),
            ]),
        Err(e) => {
            warn!("invalid allowed_origin {:?}, falling back to permissive CORS: {}", allowed_origin, e);
            CorsLayer::permissive()
        }
    }
}
