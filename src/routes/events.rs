/// Live change feed over server-sent events.
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::rbac::AuthUser;
use crate::services::event_stream::{EventFilter, EventHub};
use crate::AppState;

/// GET /events - SSE stream of note and points changes
pub async fn live_events(
    State(hub): State<Arc<EventHub>>,
    AuthUser { user, .. }: AuthUser,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = hub.subscribe();
    tracing::debug!(
        user_id = %user.id,
        subscribers = hub.subscriber_count(),
        "event subscriber connected"
    );

    // Dropping the stream on disconnect drops the receiver with it.
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !event.visible_to(&user) || !filter.matches(&event) {
                        continue;
                    }
                    match Event::default().json_data(&event) {
                        Ok(sse) => yield Ok(sse),
                        Err(e) => tracing::warn!(error = %e, "event encode failed"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(live_events))
}
