//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Emission attempted on a response handler that already completed.
    ResponseStreamClosed(String),
    /// Chunk emitted on a text stream that already completed.
    StreamClosed(String),
    /// JSON payload could not be encoded or is not a JSON object.
    NonSerializableContent(String),
    /// Delivery channel between producer and transport is gone.
    Sink(String),
    /// Failure inside a scheduled agent computation.
    Agent(String),
    /// Inbound request failed validation.
    Request(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResponseStreamClosed(msg) => write!(f, "response stream closed: {msg}"),
            Self::StreamClosed(msg) => write!(f, "stream closed: {msg}"),
            Self::NonSerializableContent(msg) => write!(f, "non-serializable content: {msg}"),
            Self::Sink(msg) => write!(f, "sink: {msg}"),
            Self::Agent(msg) => write!(f, "agent: {msg}"),
            Self::Request(msg) => write!(f, "request: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::NonSerializableContent(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
