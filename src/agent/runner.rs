//! Scheduling of agent computations with guaranteed termination.
//!
//! The transport never waits on an agent directly. It spawns
//! [`run_agent`] on a dedicated task and drains the response channel.
//! Whatever the agent does, the runner leaves the response completed:
//!
//! - returns `Ok` after completing: nothing to do;
//! - returns `Ok` while still open: the runner calls `complete()`;
//! - returns `Err`, panics, or overruns the timeout while still open: the
//!   runner emits an error event (code 500) and then `complete()`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn, Instrument};

use super::Agent;
use crate::models::event::DEFAULT_ERROR_CODE;
use crate::models::request::{Query, Session};
use crate::response::ResponseHandler;
use crate::{AppError, Result};

/// How an agent computation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The agent completed the response itself.
    Completed,
    /// The agent returned without completing; the runner completed it.
    AutoCompleted,
    /// The agent failed; the runner reported the failure if it could.
    Failed(String),
}

/// Spawn [`run_agent`] on its own task, tagged with the request id.
#[must_use]
pub fn spawn_agent(
    agent: Arc<dyn Agent>,
    session: Session,
    query: Query,
    handler: ResponseHandler,
    timeout: Option<Duration>,
) -> JoinHandle<RunOutcome> {
    let span = info_span!(
        "agent_run",
        request_id = %session.request_id,
        query_id = %query.id,
    );
    tokio::spawn(run_agent(agent, session, query, handler, timeout).instrument(span))
}

/// Drive one agent computation to a terminated response.
pub async fn run_agent(
    agent: Arc<dyn Agent>,
    session: Session,
    query: Query,
    mut handler: ResponseHandler,
    timeout: Option<Duration>,
) -> RunOutcome {
    let failure = {
        let computation =
            AssertUnwindSafe(agent.assist(&session, &query, &mut handler)).catch_unwind();
        let caught = match timeout {
            Some(limit) => tokio::time::timeout(limit, computation).await.ok(),
            None => Some(computation.await),
        };
        match caught {
            Some(Ok(Ok(()))) => None,
            Some(Ok(Err(err))) => Some(("error", err.to_string())),
            Some(Err(payload)) => Some((
                "panic",
                AppError::Agent(format!("panicked: {}", panic_message(&*payload)))
                    .to_string(),
            )),
            None => Some((
                "timeout",
                AppError::Agent(format!("timed out after {:?}", timeout.unwrap_or_default()))
                    .to_string(),
            )),
        }
    };

    match failure {
        None if handler.is_complete() => {
            debug!("agent completed response");
            RunOutcome::Completed
        }
        None => {
            warn!("agent returned without completing the response; completing it");
            if let Err(err) = handler.complete().await {
                warn!(%err, "could not complete response");
            }
            RunOutcome::AutoCompleted
        }
        Some((kind, message)) => finish_failed(&mut handler, kind, message).await,
    }
}

async fn finish_failed(handler: &mut ResponseHandler, kind: &str, message: String) -> RunOutcome {
    error!(failure = kind, %message, "agent computation failed");
    if handler.is_complete() {
        return RunOutcome::Failed(message);
    }
    if let Err(err) = report_failure(handler, kind, &message).await {
        warn!(%err, "could not report agent failure to the caller");
    }
    RunOutcome::Failed(message)
}

async fn report_failure(handler: &mut ResponseHandler, kind: &str, message: &str) -> Result<()> {
    let mut details = Map::new();
    details.insert("failure".into(), Value::String(kind.to_owned()));
    handler
        .emit_error(message, DEFAULT_ERROR_CODE, Some(details))
        .await?;
    handler.complete().await
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
