#![allow(dead_code)]

use async_trait::async_trait;
use futures::{stream, StreamExt};
use llm_accel::model::{ChatFrame, ChatRequest, Message};
use llm_accel::transport::{FrameStream, Transport};
use llm_accel::{AssistantConfig, Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the scripted server answers.
#[derive(Clone)]
pub enum Script {
    /// "answer to <prompt>", streamed two words per frame.
    Echo,
    /// Fixed increments, terminated by a done frame.
    Fixed(Vec<&'static str>),
    /// Every call fails with this error.
    Fail(Error),
    /// Succeeds with no text.
    Empty,
    /// Streams these increments, then a malformed frame.
    BreakAfter(Vec<&'static str>),
    /// Fails only for prompts equal to the given one, echoes otherwise.
    FailOn(&'static str),
    /// Streams these increments, then goes silent without closing.
    Stall(Vec<&'static str>),
}

pub struct ScriptedTransport {
    script: Script,
    delay: Duration,
    pub chat_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            chat_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    async fn begin(&self, req: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(req.clone());
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        let prompt = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        match &self.script {
            Script::Fail(e) => Err(e.clone()),
            Script::FailOn(bad) if prompt == *bad => {
                Err(Error::Connectivity("scripted failure".into()))
            }
            Script::Fixed(parts) | Script::BreakAfter(parts) | Script::Stall(parts) => {
                Ok(parts.concat())
            }
            Script::Empty => Ok(String::new()),
            Script::Echo | Script::FailOn(_) => Ok(format!("answer to {}", prompt)),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["llama3.2:1b".to_string()])
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatFrame> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let text = self.begin(req).await?;
        Ok(ChatFrame { message: Some(Message::assistant(text)), done: true })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<FrameStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let text = self.begin(req).await?;
        let mut frames: Vec<Result<ChatFrame>> = match &self.script {
            Script::Fixed(parts) | Script::BreakAfter(parts) | Script::Stall(parts) => {
                parts.iter().map(|p| Ok(ChatFrame::delta(*p))).collect()
            }
            _ => llm_accel::stream::chunk_words(&text, 2)
                .into_iter()
                .map(|c| Ok(ChatFrame::delta(c)))
                .collect(),
        };
        match self.script {
            Script::BreakAfter(_) => frames.push(Err(Error::Protocol("truncated frame".into()))),
            Script::Stall(_) => return Ok(Box::pin(stream::iter(frames).chain(stream::pending()))),
            _ => {}
        }
        frames.push(Ok(ChatFrame::done()));
        Ok(Box::pin(stream::iter(frames)))
    }
}

/// Config tuned for tests: no replay delay, quick preload polling.
pub fn test_config() -> AssistantConfig {
    let mut config = AssistantConfig::default();
    config.optimization.replay_delay_ms = 0;
    config.preload.prompts = Vec::new();
    config.preload.poll_timeout_ms = 10;
    config.preload.idle_backoff_ms = 50;
    config
}

pub fn collector() -> (std::sync::Arc<Mutex<Vec<String>>>, impl FnMut(&str) + Send) {
    let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
    let sink_seen = std::sync::Arc::clone(&seen);
    (seen, move |s: &str| sink_seen.lock().unwrap().push(s.to_string()))
}
