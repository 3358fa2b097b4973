//! Error-to-response translation
//!
//! Validation problems answer 400 with their message; unknown resources
//! answer 404. Everything else is a server fault: the detail goes to the
//! log and the client gets a generic 500 body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skywatch_common::Error;
use tracing::error;

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            other => {
                error!("request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
