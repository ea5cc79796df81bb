//! Response emission: the handler façade and its text streams.

pub mod handler;
pub mod text_stream;

pub use handler::{ResponseContent, ResponseHandler};
pub use text_stream::TextStream;
