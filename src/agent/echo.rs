//! Demo agent that streams the prompt back to the caller.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use super::Agent;
use crate::models::request::{Query, Session};
use crate::response::ResponseHandler;
use crate::Result;

/// Echoes each query: an acknowledgement block, the prompt streamed word by
/// word, then a summary document.
#[derive(Debug, Clone)]
pub struct EchoAgent {
    name: String,
    chunk_delay: Duration,
}

impl EchoAgent {
    /// Create an echo agent pausing `chunk_delay` between streamed words.
    #[must_use]
    pub fn new(name: impl Into<String>, chunk_delay: Duration) -> Self {
        Self {
            name: name.into(),
            chunk_delay,
        }
    }
}

impl Agent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn assist<'a>(
        &'a self,
        session: &'a Session,
        query: &'a Query,
        handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            debug!(prompt_len = query.prompt.len(), "echo agent assisting");

            handler
                .emit_text_block("ACKNOWLEDGEMENT", &format!("Echoing query {}", query.id))
                .await?;

            let stream = handler.create_text_stream("FINAL_RESPONSE")?;
            let mut words = 0usize;
            for (i, word) in query.prompt.split_whitespace().enumerate() {
                if i > 0 {
                    if !self.chunk_delay.is_zero() {
                        tokio::time::sleep(self.chunk_delay).await;
                    }
                    stream.emit_chunk(" ").await?;
                }
                stream.emit_chunk(word).await?;
                words += 1;
            }
            stream.complete().await?;

            handler
                .emit_json(
                    "SUMMARY",
                    &json!({
                        "query_id": query.id,
                        "activity_id": session.activity_id,
                        "words": words,
                        "interactions": session.interactions.len(),
                    }),
                )
                .await?;

            handler.complete().await
        })
    }
}
