//! Agent abstraction driven by the streaming transport.
//!
//! An [`Agent`] answers one query per call by emitting events through the
//! [`ResponseHandler`] it is given. The transport schedules each call on
//! its own task via [`runner::run_agent`], which also guarantees that the
//! response terminates even when the agent fails.

pub mod echo;
pub mod runner;

use std::future::Future;
use std::pin::Pin;

use crate::models::request::{Query, Session};
use crate::response::ResponseHandler;
use crate::Result;

pub use echo::EchoAgent;

/// Computation that answers a query by emitting response events.
pub trait Agent: Send + Sync {
    /// Display name used for the response identity.
    fn name(&self) -> &str;

    /// Answer `query` within `session`, emitting through `handler`.
    ///
    /// Implementations should finish with [`ResponseHandler::complete`] or
    /// [`ResponseHandler::respond`]; the runner completes the response on
    /// their behalf otherwise.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller as an error event followed by the
    /// terminal event, provided the response is still open.
    fn assist<'a>(
        &'a self,
        session: &'a Session,
        query: &'a Query,
        handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
