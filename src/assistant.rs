use crate::cache::{Fingerprint, ResponseCache};
use crate::config::AssistantConfig;
use crate::context::ConversationContext;
use crate::error::{Error, Result};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::model::{AskOptions, Message, RequestParams, ResolvedParams};
use crate::preload::{PreloadHandle, PreloadWorker};
use crate::stream::{self, Decoded, IncrementSink};
use crate::transport::{OllamaTransport, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Words per chunk when a cached answer is replayed to a sink.
const REPLAY_WORDS_PER_CHUNK: usize = 10;

/// Entry point for asking questions. Shared between foreground callers and
/// the preload worker; the cache, context and metrics are all internally
/// synchronized, so an `Arc<Assistant>` can be used from any task.
pub struct Assistant {
    config: AssistantConfig,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    context: Mutex<ConversationContext>,
    metrics: MetricsRecorder,
}

impl Assistant {
    pub fn new(config: AssistantConfig, transport: Arc<dyn Transport>) -> Self {
        let cache = ResponseCache::new(config.optimization.cache_max_size, config.cache_ttl());
        let context = Mutex::new(ConversationContext::new(config.max_context_messages));
        Self { config, transport, cache, context, metrics: MetricsRecorder::new() }
    }

    /// Builds an assistant over HTTP and checks the server once. An
    /// unreachable server is only logged; requests report their own errors.
    pub async fn connect(config: AssistantConfig) -> Result<Arc<Self>> {
        let transport = OllamaTransport::new(&config.base_url, config.timeout())?;
        let assistant = Arc::new(Self::new(config, Arc::new(transport)));
        assistant.verify_connection().await;
        info!(
            "Assistant initialized (model: {}, streaming: {})",
            assistant.config.model, assistant.config.stream
        );
        Ok(assistant)
    }

    pub async fn verify_connection(&self) -> bool {
        match self.transport.list_models().await {
            Ok(models) => {
                info!("Connected to inference server - {} models available", models.len());
                true
            }
            Err(e) => {
                warn!("Cannot reach inference server at {}: {}", self.config.base_url, e);
                false
            }
        }
    }

    /// Spawns the warm-up worker unless preloading is disabled.
    pub fn start_preloading(self: &Arc<Self>) -> Option<PreloadHandle> {
        if !self.config.optimization.preload_common_queries {
            return None;
        }
        Some(PreloadWorker::spawn(Arc::clone(self), &self.config.preload))
    }

    pub async fn ask(
        &self,
        prompt: &str,
        opts: AskOptions,
        sink: Option<IncrementSink<'_>>,
    ) -> Result<String> {
        let start = Instant::now();
        self.metrics.record_request();

        let params = self.config.resolve(&opts.params);
        let use_cache = opts.use_cache && self.config.optimization.cache_responses;
        let key = Fingerprint::for_request(prompt, &params);

        // 1. Cache lookup
        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                self.metrics.record_cache_hit();
                debug!(key = %key.short(), "cache hit");
                if let Some(sink) = sink {
                    self.replay(&cached, sink).await;
                }
                self.metrics.record_elapsed(start.elapsed());
                return Ok(cached);
            }
        }

        // 2. Message assembly
        let mut messages = if opts.use_context { self.context.lock().snapshot() } else { Vec::new() };
        messages.push(Message::user(prompt));

        // 3. Dispatch
        let streaming = sink.is_some() && self.config.stream;
        let decoded = match sink {
            Some(sink) if self.config.stream => {
                self.metrics.record_streaming();
                self.dispatch_streaming(messages, &params, sink).await
            }
            _ => self.dispatch_one_shot(messages, &params).await,
        };
        let result = decoded.into_result();

        // 4. Context and cache updates
        match &result {
            Ok(text) => {
                if opts.use_context {
                    self.context.lock().append(prompt, text.as_str());
                }
                if use_cache {
                    self.cache.put(key, text.as_str());
                }
            }
            Err(Error::EmptyResult) => warn!("Inference server returned an empty answer"),
            Err(e) => error!("Request failed: {}", e),
        }

        let elapsed = start.elapsed();
        self.metrics.record_elapsed(elapsed);
        info!("Response generated in {:?} (streaming: {})", elapsed, streaming);

        result
    }

    /// One-off question: no conversation context, cache enabled.
    pub async fn quick_ask(&self, prompt: &str, params: RequestParams) -> Result<String> {
        self.ask(prompt, AskOptions::default().with_params(params), None).await
    }

    /// Like [`Assistant::ask`] but collapses every failure into an empty answer.
    pub async fn ask_or_empty(
        &self,
        prompt: &str,
        opts: AskOptions,
        sink: Option<IncrementSink<'_>>,
    ) -> String {
        self.ask(prompt, opts, sink).await.unwrap_or_default()
    }

    /// Whether a live answer for this prompt is cached, without touching
    /// recency or the hit counters.
    pub fn is_cached(&self, prompt: &str, params: &RequestParams) -> bool {
        if !self.config.optimization.cache_responses {
            return false;
        }
        let key = Fingerprint::for_request(prompt, &self.config.resolve(params));
        self.cache.contains(&key)
    }

    pub fn clear_context(&self) {
        self.context.lock().clear();
        debug!("Conversation context cleared");
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Response cache cleared");
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let context_messages = self.context.lock().len();
        self.metrics.snapshot(self.cache.len(), context_messages)
    }

    pub fn context_snapshot(&self) -> Vec<Message> {
        self.context.lock().snapshot()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn dispatch_streaming(
        &self,
        messages: Vec<Message>,
        params: &ResolvedParams,
        sink: IncrementSink<'_>,
    ) -> Decoded {
        let req = params.chat_request(messages, true);
        let call = async {
            match self.transport.chat_stream(&req).await {
                Ok(frames) => stream::decode(frames, sink).await,
                Err(e) => Decoded { text: String::new(), error: Some(e) },
            }
        };
        match tokio::time::timeout(params.timeout, call).await {
            Ok(decoded) => decoded,
            Err(_) => Decoded { text: String::new(), error: Some(Error::Timeout(params.timeout)) },
        }
    }

    async fn dispatch_one_shot(&self, messages: Vec<Message>, params: &ResolvedParams) -> Decoded {
        let req = params.chat_request(messages, false);
        let response = tokio::time::timeout(params.timeout, self.transport.chat(&req))
            .await
            .unwrap_or(Err(Error::Timeout(params.timeout)));
        stream::decode_one_shot(response)
    }

    async fn replay(&self, text: &str, sink: IncrementSink<'_>) {
        let delay = self.config.replay_delay();
        for chunk in stream::chunk_words(text, REPLAY_WORDS_PER_CHUNK) {
            sink(&chunk);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
