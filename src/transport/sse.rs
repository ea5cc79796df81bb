//! HTTP/SSE transport for agent responses.
//!
//! `POST /assist` accepts an [`AssistRequest`], spawns the agent on its own
//! task and answers with a `text/event-stream` body. Each event becomes one
//! frame:
//!
//! ```text
//! event: <event_name>
//! data: <event JSON>
//!
//! ```
//!
//! The body ends right after the `done` frame. The agent task and the body
//! stream share nothing but the response channel.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::runner::spawn_agent;
use crate::agent::Agent;
use crate::config::GlobalConfig;
use crate::hook::{self, EventReceiver};
use crate::models::event::{
    ErrorContent, Event, EventPayload, DEFAULT_ERROR_CODE, ERROR_EVENT_NAME, SCHEMA_VERSION,
};
use crate::models::identity::Identity;
use crate::models::request::{AssistRequest, Session};
use crate::response::ResponseHandler;
use crate::{AppError, Result};

/// State shared by every request.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Agent answering `/assist` requests.
    pub agent: Arc<dyn Agent>,
}

/// Handler for `GET /health`: 200 OK with a plain-text body.
async fn health() -> &'static str {
    "ok"
}

/// Handler for `POST /assist`.
async fn assist(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssistRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        warn!(%err, "rejected assist request");
        return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response();
    }

    let session = Session::from_object(request.session, &state.config.agent.default_processor_id);
    let identity = Identity::new(session.processor_id.clone(), state.agent.name());
    let (hook, receiver) = hook::channel();
    let handler = ResponseHandler::new(identity, Arc::new(hook));

    info!(
        request_id = %session.request_id,
        query_id = %request.query.id,
        "assist request accepted"
    );

    // Detached: the task ends when the agent terminates the response.
    drop(spawn_agent(
        Arc::clone(&state.agent),
        session,
        request.query,
        handler,
        state.config.agent_timeout(),
    ));

    Sse::new(event_stream(receiver))
        .keep_alive(KeepAlive::new().interval(state.config.keep_alive()))
        .into_response()
}

/// Pop events in delivery order until the terminal event has been sent.
fn event_stream(
    receiver: EventReceiver,
) -> impl Stream<Item = std::result::Result<SseEvent, Infallible>> {
    futures_util::stream::unfold(Some(receiver), |state| async move {
        let mut receiver = state?;
        let Some(event) = receiver.recv().await else {
            warn!("delivery channel closed before the done event");
            return None;
        };
        let next = if event.is_done() { None } else { Some(receiver) };
        Some((Ok(render(&event)), next))
    })
}

/// Render one event as an SSE frame.
fn render(event: &Event) -> SseEvent {
    let (name, data) = frame_parts(event, event.to_json());
    SseEvent::default().event(sse_field(&name)).data(data)
}

/// Frame name and data for `event`, given the outcome of encoding it.
///
/// An event that fails to encode is replaced by an `atomic.error` event
/// with the same id and source, so the consumer sees the failure.
fn frame_parts(event: &Event, encoded: Result<String>) -> (String, String) {
    let err = match encoded {
        Ok(data) => return (event.event_name.clone(), data),
        Err(err) => err,
    };
    error!(%err, event_id = %event.id, "failed to encode event");
    let replacement = Event {
        id: event.id.clone(),
        source: event.source.clone(),
        event_name: ERROR_EVENT_NAME.to_owned(),
        schema_version: SCHEMA_VERSION.to_owned(),
        payload: EventPayload::Error {
            content: ErrorContent {
                error_message: err.to_string(),
                error_code: DEFAULT_ERROR_CODE,
                details: None,
            },
        },
    };
    // Strings and an integer only; encoding this cannot fail.
    let data = replacement.to_json().unwrap_or_default();
    (replacement.event_name, data)
}

/// SSE field values cannot span lines.
fn sse_field(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Build the axum router for the agent endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/assist", post(assist))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `config.http_host:config.http_port` and serve until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the address is invalid or cannot be
/// bound, or `AppError::Io` if the server fails.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = state.config.bind_addr()?;
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind SSE on {bind}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, agent = state.agent.name(), "starting HTTP/SSE transport");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("SSE server error: {err}")))?;

    info!("HTTP/SSE transport shut down");
    Ok(())
}
