//! Inbound assist request and the session derived from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppError, Result};

/// The caller's question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// Caller-assigned query identifier.
    pub id: String,
    /// Prompt text.
    pub prompt: String,
}

/// Session state supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionObject {
    /// Identifier of the processor the response is attributed to.
    pub processor_id: String,
    /// Identifier of the ongoing activity.
    pub activity_id: String,
    /// Identifier of this request within the activity.
    pub request_id: String,
    /// Prior exchanges, passed through to the agent untouched.
    #[serde(default)]
    pub interactions: Vec<Value>,
}

/// Body of `POST /assist`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistRequest {
    /// Optional caller session; filled with defaults when absent.
    #[serde(default)]
    pub session: Option<SessionObject>,
    /// The query to answer.
    pub query: Query,
}

impl AssistRequest {
    /// Check the request before any response handler is built.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Request` if the query id is empty or a supplied
    /// session carries an empty `processor_id`.
    pub fn validate(&self) -> Result<()> {
        if self.query.id.trim().is_empty() {
            return Err(AppError::Request("query.id must not be empty".into()));
        }
        if let Some(session) = &self.session {
            if session.processor_id.trim().is_empty() {
                return Err(AppError::Request(
                    "session.processor_id must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Session handed to an agent for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Identifier of the processor the response is attributed to.
    pub processor_id: String,
    /// Identifier of the ongoing activity.
    pub activity_id: String,
    /// Identifier of this request within the activity.
    pub request_id: String,
    /// Prior exchanges supplied by the caller.
    pub interactions: Vec<Value>,
}

impl Session {
    /// Build a session from the request, generating fresh ids when the
    /// caller supplied none.
    #[must_use]
    pub fn from_object(object: Option<SessionObject>, default_processor_id: &str) -> Self {
        match object {
            Some(obj) => Self {
                processor_id: obj.processor_id,
                activity_id: obj.activity_id,
                request_id: obj.request_id,
                interactions: obj.interactions,
            },
            None => Self {
                processor_id: default_processor_id.to_owned(),
                activity_id: Uuid::now_v7().to_string(),
                request_id: Uuid::now_v7().to_string(),
                interactions: Vec::new(),
            },
        }
    }
}
