#![forbid(unsafe_code)]

//! Ordered agent response events streamed over Server-Sent Events.

pub mod agent;
pub mod config;
pub mod errors;
pub mod hook;
pub mod models;
pub mod response;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
