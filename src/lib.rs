//! Response acceleration for a chat client backed by a local inference server.
//!
//! Answers are cached by request fingerprint with TTL and LRU eviction,
//! streamed to caller sinks as frames arrive, and pre-warmed for anticipated
//! prompts by a background worker. [`Assistant`] ties the pieces together.

pub mod assistant;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod model;
pub mod preload;
pub mod stream;
pub mod transport;

pub use assistant::Assistant;
pub use cache::{Fingerprint, ResponseCache};
pub use config::AssistantConfig;
pub use error::{Error, ErrorKind, Result};
pub use metrics::MetricsSnapshot;
pub use model::{AskOptions, Message, RequestParams, Role};
pub use preload::{PreloadHandle, PreloadState};
pub use transport::{OllamaTransport, Transport};
