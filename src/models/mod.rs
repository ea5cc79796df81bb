//! Domain model module declarations.

pub mod event;
pub mod identity;
pub mod request;
