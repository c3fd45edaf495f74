use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Options bag forwarded to the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub num_predict: u32,
    pub num_ctx: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub options: ChatOptions,
}

/// One unit of a chat response. A one-shot response is a single frame with
/// `done` set; a chunked response is a sequence of frames ending with one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub done: bool,
}

impl ChatFrame {
    pub fn delta(text: impl Into<String>) -> Self {
        Self { message: Some(Message::assistant(text)), done: false }
    }

    pub fn done() -> Self {
        Self { message: None, done: true }
    }

    pub fn text(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// Per-request overrides. Unset fields fall back to the assistant config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub context_window: Option<u32>,
    pub timeout: Option<Duration>,
    /// Additional sampling parameters. These change the answer, so they are
    /// part of the cache key and are forwarded in the options bag.
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl RequestParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// Request parameters with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
    pub timeout: Duration,
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl ResolvedParams {
    pub fn chat_request(&self, messages: Vec<Message>, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            stream,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                num_ctx: self.context_window,
                extra: self.extras.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskOptions {
    pub use_context: bool,
    pub use_cache: bool,
    pub params: RequestParams,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self { use_context: false, use_cache: true, params: RequestParams::default() }
    }
}

impl AskOptions {
    pub fn with_context(mut self) -> Self {
        self.use_context = true;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}
