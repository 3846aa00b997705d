use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use events::{EventBus, EventEnvelope};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;
pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub session_id: Option<Uuid>,
}

pub struct EventBuffer {
    events: VecDeque<EventEnvelope>,
    max_size: usize,
}

impl EventBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, envelope: EventEnvelope) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(envelope);
    }

    pub fn events_after(&self, event_id: Uuid) -> Vec<EventEnvelope> {
        let mut found = false;
        self.events
            .iter()
            .filter_map(|envelope| {
                if found {
                    Some(envelope.clone())
                } else if envelope.id == event_id {
                    found = true;
                    None
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type SharedEventBuffer = Arc<RwLock<EventBuffer>>;

/// Copy every published envelope into `buffer` so reconnecting clients can replay.
///
/// Runs until the bus is dropped. Outside a tokio runtime nothing is recorded.
pub fn spawn_event_recorder(bus: &EventBus, buffer: SharedEventBuffer) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No tokio runtime; SSE replay buffer disabled");
        return;
    };

    let mut rx = bus.subscribe();
    handle.spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => buffer
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE replay buffer lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn matches_session(envelope: &EventEnvelope, session_id: Option<Uuid>) -> bool {
    match (session_id, envelope.event.session_id()) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

fn envelope_to_sse_event(envelope: &EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.event_type())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(
        ("session_id" = Option<Uuid>, Query, description = "Only stream events for this session"),
    ),
    responses(
        (status = 200, description = "SSE event stream"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: axum::http::HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = query.session_id;
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok());

    // Subscribe before reading the buffer so nothing falls between replay and live.
    let rx = state.event_bus.subscribe();

    let missed_events: Vec<EventEnvelope> = match last_event_id {
        Some(event_id) => state
            .event_buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events_after(event_id)
            .into_iter()
            .filter(|e| matches_session(e, session_id))
            .collect(),
        None => vec![],
    };
    let replayed_up_to = missed_events.iter().filter_map(|e| e.sequence).max();

    let missed_stream =
        futures::stream::iter(missed_events.into_iter().map(|e| envelope_to_sse_event(&e)));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(envelope) => {
                if !matches_session(&envelope, session_id) {
                    return None;
                }
                if let (Some(seq), Some(replayed)) = (envelope.sequence, replayed_up_to) {
                    if seq <= replayed {
                        return None;
                    }
                }
                Some(envelope_to_sse_event(&envelope))
            }
            Err(e) => {
                tracing::warn!("SSE broadcast error: {:?}", e);
                None
            }
        }
    });

    let stream = missed_stream.chain(live_stream);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
