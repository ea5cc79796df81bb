//! Incrementally produced block of text within one response.
//!
//! A [`TextStream`] emits `chunked.text` events sharing one `stream_id`.
//! The final chunk has `is_complete = true` and empty content; it is the
//! only end-of-stream signal a consumer gets, since several streams may
//! interleave within one response.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::hook::Hook;
use crate::models::event::Event;
use crate::models::identity::Identity;
use crate::{AppError, Result};

struct StreamInner {
    id: String,
    event_name: String,
    source: Identity,
    hook: Arc<dyn Hook>,
    complete: AtomicBool,
    // Held across each emit so the final chunk is always the stream's last.
    emit_lock: Mutex<()>,
}

/// Handle to a named text stream.
///
/// Clones share state: the copy registered with the owning
/// [`ResponseHandler`](super::ResponseHandler) and the copy returned to the
/// agent observe the same completion flag.
#[derive(Clone)]
pub struct TextStream {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream")
            .field("id", &self.inner.id)
            .field("event_name", &self.inner.event_name)
            .field("is_complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

impl TextStream {
    pub(crate) fn new(
        id: String,
        event_name: String,
        source: Identity,
        hook: Arc<dyn Hook>,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id,
                event_name,
                source,
                hook,
                complete: AtomicBool::new(false),
                emit_lock: Mutex::new(()),
            }),
        }
    }

    /// Stream identifier carried by every chunk.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Event name carried by every chunk.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.inner.event_name
    }

    /// Whether the final chunk has been emitted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.complete.load(Ordering::Acquire)
    }

    /// Emit one chunk of text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StreamClosed` if the stream already completed, or
    /// `AppError::Sink` if the delivery channel is gone.
    pub async fn emit_chunk(&self, content: impl Into<String>) -> Result<()> {
        let _guard = self.inner.emit_lock.lock().await;
        if self.is_complete() {
            return Err(AppError::StreamClosed(format!(
                "cannot emit to completed stream {}",
                self.inner.id
            )));
        }
        let event = Event::text_chunk(
            &self.inner.source,
            self.inner.event_name.as_str(),
            self.inner.id.as_str(),
            false,
            content,
        );
        self.inner.hook.emit(event).await
    }

    /// Emit the final chunk and mark the stream complete.
    ///
    /// Calling this on a completed stream is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Sink` if the delivery channel is gone; the stream
    /// then stays open.
    pub async fn complete(&self) -> Result<()> {
        let _guard = self.inner.emit_lock.lock().await;
        if self.is_complete() {
            return Ok(());
        }
        let event = Event::text_chunk(
            &self.inner.source,
            self.inner.event_name.as_str(),
            self.inner.id.as_str(),
            true,
            "",
        );
        self.inner.hook.emit(event).await?;
        self.inner.complete.store(true, Ordering::Release);
        debug!(stream_id = %self.inner.id, "text stream completed");
        Ok(())
    }
}
