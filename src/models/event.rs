//! Response event vocabulary and its JSON wire shape.
//!
//! Every event shares an envelope (`id`, `source`, `event_name`,
//! `schema_version`) and carries a payload discriminated by `content_type`:
//!
//! | Variant      | `content_type`      |
//! |--------------|---------------------|
//! | `TextBlock`  | `atomic.textblock`  |
//! | `Document`   | `atomic.json`       |
//! | `TextChunk`  | `chunked.text`      |
//! | `Error`      | `atomic.error`      |
//! | `Done`       | `done`              |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::Result;

/// Wire schema version stamped on every event.
pub const SCHEMA_VERSION: &str = "1.0";

/// Error code used when the caller does not supply one.
pub const DEFAULT_ERROR_CODE: i64 = 500;

/// Event name carried by every error event.
pub const ERROR_EVENT_NAME: &str = "error";

/// Event name carried by the terminal event.
pub const DONE_EVENT_NAME: &str = "done";

/// Body of an `atomic.error` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorContent {
    /// Human-readable failure description.
    pub error_message: String,
    /// Numeric failure classification.
    pub error_code: i64,
    /// Optional structured context.
    pub details: Option<Map<String, Value>>,
}

/// Variant-specific part of an [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "content_type")]
pub enum EventPayload {
    /// One complete, atomic text response.
    #[serde(rename = "atomic.textblock")]
    TextBlock {
        /// Response text.
        content: String,
    },
    /// One complete, atomic structured response.
    #[serde(rename = "atomic.json")]
    Document {
        /// Response document.
        content: Map<String, Value>,
    },
    /// One increment of an ongoing text stream.
    #[serde(rename = "chunked.text")]
    TextChunk {
        /// Stream this chunk belongs to.
        stream_id: String,
        /// End-of-stream sentinel; the final chunk has empty content.
        is_complete: bool,
        /// Chunk text.
        content: String,
    },
    /// A reported failure.
    #[serde(rename = "atomic.error")]
    Error {
        /// Failure description.
        content: ErrorContent,
    },
    /// Terminal marker; nothing follows it.
    #[serde(rename = "done")]
    Done,
}

/// One immutable unit of response content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Unique, time-ordered event identifier.
    pub id: String,
    /// Id of the [`Identity`] that produced the event.
    pub source: String,
    /// Caller-chosen name, used as the SSE `event:` field.
    pub event_name: String,
    /// Wire schema version.
    pub schema_version: String,
    /// Variant-specific content.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    fn new(source: &Identity, event_name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            source: source.id.clone(),
            event_name: event_name.into(),
            schema_version: SCHEMA_VERSION.to_owned(),
            payload,
        }
    }

    /// Build an `atomic.textblock` event.
    #[must_use]
    pub fn text_block(
        source: &Identity,
        event_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            source,
            event_name,
            EventPayload::TextBlock {
                content: content.into(),
            },
        )
    }

    /// Build an `atomic.json` event from an already-validated document.
    #[must_use]
    pub fn document(
        source: &Identity,
        event_name: impl Into<String>,
        content: Map<String, Value>,
    ) -> Self {
        Self::new(source, event_name, EventPayload::Document { content })
    }

    /// Build a `chunked.text` event.
    #[must_use]
    pub fn text_chunk(
        source: &Identity,
        event_name: impl Into<String>,
        stream_id: impl Into<String>,
        is_complete: bool,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            source,
            event_name,
            EventPayload::TextChunk {
                stream_id: stream_id.into(),
                is_complete,
                content: content.into(),
            },
        )
    }

    /// Build an `atomic.error` event, always named [`ERROR_EVENT_NAME`].
    #[must_use]
    pub fn error(
        source: &Identity,
        error_message: impl Into<String>,
        error_code: i64,
        details: Option<Map<String, Value>>,
    ) -> Self {
        Self::new(
            source,
            ERROR_EVENT_NAME,
            EventPayload::Error {
                content: ErrorContent {
                    error_message: error_message.into(),
                    error_code,
                    details,
                },
            },
        )
    }

    /// Build the terminal event, always named [`DONE_EVENT_NAME`].
    #[must_use]
    pub fn done(source: &Identity) -> Self {
        Self::new(source, DONE_EVENT_NAME, EventPayload::Done)
    }

    /// Discriminator written into the `content_type` field.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.payload {
            EventPayload::TextBlock { .. } => "atomic.textblock",
            EventPayload::Document { .. } => "atomic.json",
            EventPayload::TextChunk { .. } => "chunked.text",
            EventPayload::Error { .. } => "atomic.error",
            EventPayload::Done => "done",
        }
    }

    /// Whether this is the terminal event of a response.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.payload, EventPayload::Done)
    }

    /// Encode the event as a single-line JSON string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NonSerializableContent` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
