use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

use crate::{middleware::auth::AuthUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(subscribe))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EventsQuery {
    /// Restrict the stream to one table.
    pub table: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(
        ("table" = Option<String>, Query, description = "Only forward changes of this table"),
    ),
    responses(
        (status = 200, description = "Change events as text/event-stream", content_type = "text/event-stream")
    ),
    security(("bearer_auth" = [])),
    tag = "Events"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let table = query.table;

    // Lagged subscribers just skip ahead; events are only re-fetch triggers,
    // so missing some is harmless.
    let stream = futures::stream::unfold((rx, table), |(mut rx, table)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(wanted) = table.as_deref() {
                        if event.table != wanted {
                            continue;
                        }
                    }
                    match Event::default().event(event.table).json_data(&event) {
                        Ok(sse_event) => return Some((Ok(sse_event), (rx, table))),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to encode change event");
                            continue;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
