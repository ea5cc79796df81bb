//! Source identity attached to every emitted event.

use serde::{Deserialize, Serialize};

/// Named source an event is attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Stable identifier written into each event's `source` field.
    pub id: String,
    /// Human-readable name of the agent.
    pub name: String,
}

impl Identity {
    /// Construct an identity from its id and display name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
