//! Per-response emission façade and completion state machine.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::text_stream::TextStream;
use crate::hook::Hook;
use crate::models::event::{Event, DEFAULT_ERROR_CODE};
use crate::models::identity::Identity;
use crate::{AppError, Result};

/// Completion state of a response. Moves `Open → Complete` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    Open,
    Complete,
}

/// Payload accepted by [`ResponseHandler::respond`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    /// Answer with an `atomic.textblock` event.
    Text(String),
    /// Answer with an `atomic.json` event. Must hold a JSON object.
    Document(Value),
}

impl ResponseContent {
    /// Encode any serializable value as a document response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NonSerializableContent` if `data` cannot be
    /// encoded as JSON.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Ok(Self::Document(serde_json::to_value(data)?))
    }
}

impl From<String> for ResponseContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ResponseContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for ResponseContent {
    fn from(value: Value) -> Self {
        Self::Document(value)
    }
}

impl From<Map<String, Value>> for ResponseContent {
    fn from(map: Map<String, Value>) -> Self {
        Self::Document(Value::Object(map))
    }
}

/// Require a JSON object at the top level of a document.
fn into_document(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::NonSerializableContent(format!(
            "document content must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Emits the events of one response into a [`Hook`].
///
/// Every emitting operation fails with `AppError::ResponseStreamClosed`
/// once [`complete`](Self::complete) has run. The handler is driven by a
/// single producer through `&mut self`; text streams it hands out may be
/// moved elsewhere.
pub struct ResponseHandler {
    source: Identity,
    hook: Arc<dyn Hook>,
    // Creation order; `stream_index` maps ids into it.
    streams: Vec<TextStream>,
    stream_index: HashMap<String, usize>,
    state: ResponseState,
}

impl std::fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("source", &self.source)
            .field("streams", &self.streams.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ResponseHandler {
    /// Create an open handler emitting on behalf of `source`.
    #[must_use]
    pub fn new(source: Identity, hook: Arc<dyn Hook>) -> Self {
        Self {
            source,
            hook,
            streams: Vec::new(),
            stream_index: HashMap::new(),
            state: ResponseState::Open,
        }
    }

    /// Identity every event is attributed to.
    #[must_use]
    pub fn source(&self) -> &Identity {
        &self.source
    }

    /// Whether the terminal event has been emitted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == ResponseState::Complete
    }

    /// Look up a text stream created by this handler.
    #[must_use]
    pub fn stream(&self, stream_id: &str) -> Option<&TextStream> {
        self.stream_index
            .get(stream_id)
            .and_then(|&index| self.streams.get(index))
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ResponseState::Open => Ok(()),
            ResponseState::Complete => Err(AppError::ResponseStreamClosed(
                "cannot send to a completed response handler".into(),
            )),
        }
    }

    /// Answer with a single atomic event, then complete the response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResponseStreamClosed` if the response already
    /// completed, `AppError::NonSerializableContent` if a document is not a
    /// JSON object (nothing is emitted in either case), or `AppError::Sink`
    /// if delivery fails.
    pub async fn respond(
        &mut self,
        event_name: &str,
        response: impl Into<ResponseContent>,
    ) -> Result<()> {
        self.ensure_open()?;
        let event = match response.into() {
            ResponseContent::Text(text) => Event::text_block(&self.source, event_name, text),
            ResponseContent::Document(value) => {
                Event::document(&self.source, event_name, into_document(value)?)
            }
        };
        self.hook.emit(event).await?;
        self.complete().await
    }

    /// Emit one atomic text block without completing the response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResponseStreamClosed` if the response already
    /// completed, or `AppError::Sink` if delivery fails.
    pub async fn emit_text_block(&mut self, event_name: &str, content: &str) -> Result<()> {
        self.ensure_open()?;
        let event = Event::text_block(&self.source, event_name, content);
        self.hook.emit(event).await
    }

    /// Emit one atomic JSON document without completing the response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResponseStreamClosed` if the response already
    /// completed, `AppError::NonSerializableContent` if `data` cannot be
    /// encoded as a JSON object, or `AppError::Sink` if delivery fails.
    pub async fn emit_json<T: Serialize + ?Sized>(
        &mut self,
        event_name: &str,
        data: &T,
    ) -> Result<()> {
        self.ensure_open()?;
        let content = into_document(serde_json::to_value(data)?)?;
        let event = Event::document(&self.source, event_name, content);
        self.hook.emit(event).await
    }

    /// Open a new text stream and register it with this handler.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResponseStreamClosed` if the response already
    /// completed.
    pub fn create_text_stream(&mut self, event_name: &str) -> Result<TextStream> {
        self.ensure_open()?;
        let mut stream_id = Uuid::new_v4().simple().to_string();
        while self.stream_index.contains_key(&stream_id) {
            stream_id = Uuid::new_v4().simple().to_string();
        }
        let stream = TextStream::new(
            stream_id.clone(),
            event_name.to_owned(),
            self.source.clone(),
            Arc::clone(&self.hook),
        );
        debug!(stream_id = %stream_id, event_name, "text stream created");
        self.stream_index.insert(stream_id, self.streams.len());
        self.streams.push(stream.clone());
        Ok(stream)
    }

    /// Emit an error event. The response stays open.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResponseStreamClosed` if the response already
    /// completed, or `AppError::Sink` if delivery fails.
    pub async fn emit_error(
        &mut self,
        error_message: &str,
        error_code: i64,
        details: Option<Map<String, Value>>,
    ) -> Result<()> {
        self.ensure_open()?;
        let event = Event::error(&self.source, error_message, error_code, details);
        self.hook.emit(event).await
    }

    /// Emit an error event with [`DEFAULT_ERROR_CODE`] and no details.
    ///
    /// # Errors
    ///
    /// Same as [`emit_error`](Self::emit_error).
    pub async fn emit_error_default(&mut self, error_message: &str) -> Result<()> {
        self.emit_error(error_message, DEFAULT_ERROR_CODE, None).await
    }

    /// Complete every open text stream in creation order, then emit the
    /// terminal event.
    ///
    /// Calling this on a completed response is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Sink` if delivery fails. A failure while closing
    /// streams leaves the response open.
    pub async fn complete(&mut self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        for stream in &self.streams {
            stream.complete().await?;
        }
        self.state = ResponseState::Complete;
        info!(
            source = %self.source.id,
            streams = self.streams.len(),
            "response complete"
        );
        self.hook.emit(Event::done(&self.source)).await
    }
}
