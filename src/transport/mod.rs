mod ollama;

pub use ollama::OllamaTransport;

use crate::error::Result;
use crate::model::{ChatFrame, ChatRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type FrameStream = BoxStream<'static, Result<ChatFrame>>;

/// Connection to the inference server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Names of the models the server can run. Used as a reachability check.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// One-shot chat: the whole answer in a single frame.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatFrame>;

    /// Chunked chat: frames in arrival order, the last one flagged done.
    async fn chat_stream(&self, req: &ChatRequest) -> Result<FrameStream>;
}
