//! Server-Sent Events stream for live favorites updates
//!
//! Each authenticated session subscribes to the event bus and receives
//! its own user's events; catalog-level events go to everyone. Heartbeat
//! comments keep intermediaries from closing idle connections.

use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::auth::CurrentUser;
use crate::AppState;

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %user.user_id, "SSE client connected");

    let mut rx = state.events.subscribe();
    let user_id = user.user_id;

    let stream = async_stream::stream! {
        // Initial connected status so clients can show link state
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    // Targeted events only reach their own user
                    if event.user_id().is_some_and(|id| id != user_id) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => debug!("skipping unserializable event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "SSE subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
