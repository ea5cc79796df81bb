//! Channel-backed [`Hook`] used by the HTTP transport.
//!
//! Events travel over an unbounded tokio [`mpsc`] channel: the producer
//! never waits on the consumer, and the single receiver pops events in the
//! order they were sent.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use super::Hook;
use crate::models::event::Event;
use crate::{AppError, Result};

/// Create a connected hook/receiver pair for one response.
#[must_use]
pub fn channel() -> (QueueHook, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueHook { tx }, EventReceiver { rx })
}

/// Producer half: relays events into the delivery channel.
#[derive(Debug, Clone)]
pub struct QueueHook {
    tx: mpsc::UnboundedSender<Event>,
}

impl Hook for QueueHook {
    fn emit(&self, event: Event) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.tx.send(event).map_err(|err| {
                AppError::Sink(format!(
                    "delivery channel closed, dropped {} event",
                    err.0.content_type()
                ))
            })
        })
    }
}

/// Consumer half: pops events in delivery order.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once every producer has been dropped and the channel
    /// is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Pop the next event if one is already queued.
    ///
    /// For consumers polling from a non-async context. `None` means the
    /// queue is empty right now, not that the response ended.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Pop every event that is already queued.
    ///
    /// Collects a whole response once the agent has been awaited to the
    /// end, e.g. after [`run_agent`](crate::agent::runner::run_agent)
    /// returns, or for batch consumers that do not stream.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
