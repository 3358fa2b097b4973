//! HTTP API handlers for skywatch-fl

pub mod auth;
pub mod error;
pub mod health;
pub mod locations;
pub mod sse;

pub use auth::{auth_middleware, CurrentUser};
pub use error::ApiError;
pub use health::health_routes;
pub use locations::{
    add_location, get_location, get_user_locations, not_found, remove_location,
    update_location_order,
};
pub use sse::event_stream;
