//! Transports delivering agent responses to remote callers.

pub mod sse;
