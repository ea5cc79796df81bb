//! Ordered hand-off between event producers and the transport.
//!
//! The [`Hook`] trait is the only surface a response handler writes into.
//! It decouples the emission API from whatever delivers events to the
//! caller. Implementations must preserve order: when `emit(a)` resolves
//! before `emit(b)` is called, `a` reaches the consumer before `b`.

pub mod queue;

use std::future::Future;
use std::pin::Pin;

use crate::models::event::Event;
use crate::Result;

pub use queue::{channel, EventReceiver, QueueHook};

/// Sink that response handlers and text streams emit events into.
pub trait Hook: Send + Sync {
    /// Hand `event` to the consumer side.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Sink`](crate::AppError::Sink) if the consumer is
    /// gone. The event is not retried.
    fn emit(&self, event: Event) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
