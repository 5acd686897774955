use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::models::{Actor, BookingEvent};
use crate::state::AppState;

fn concerns(actor: &Actor, event: &BookingEvent) -> bool {
    match actor {
        Actor::Customer(id) => *id == event.customer_id,
        Actor::Provider(id) => *id == event.provider_id,
    }
}

// GET /api/events (SSE, scoped to the caller)
pub async fn stream(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let live = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if concerns(&actor, &event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().event(event.kind.as_str()).data(data),
            ))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event subscriber lagged");
            None
        }
    });

    Sse::new(live).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
}
