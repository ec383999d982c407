use crate::Result;
use crate::llm::Message;
use async_trait::async_trait;

mod logger;
pub use logger::TranscriptLogger;

/// Invoked after each pipeline stage with the messages that were exchanged
/// with the llm, including the assistant response.
#[async_trait]
pub trait Callback {
    async fn call(&mut self, stage: &str, messages: &[Message]) -> Result<()>;
}
