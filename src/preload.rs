use crate::assistant::Assistant;
use crate::config::PreloadConfig;
use crate::model::{AskOptions, RequestParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    /// Waiting on the queue.
    Idle,
    /// Warming a dequeued prompt.
    Draining,
    /// Queue was empty; backing off before polling again.
    Sleeping,
    Stopped,
}

/// Control surface for a running [`PreloadWorker`]. Dropping it detaches the
/// worker, which then runs for as long as the runtime does.
#[must_use = "dropping the handle detaches the worker, which can then no longer be stopped"]
pub struct PreloadHandle {
    queue: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: watch::Receiver<PreloadState>,
    task: JoinHandle<()>,
}

impl PreloadHandle {
    pub fn state(&self) -> PreloadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadState> {
        self.state.clone()
    }

    /// Queues another prompt for warming. Returns false if the queue is full
    /// or the worker is gone.
    pub fn enqueue(&self, prompt: impl Into<String>) -> bool {
        self.queue.try_send(prompt.into()).is_ok()
    }

    /// Stops further dequeues and waits for the worker. A warm-up already in
    /// flight still completes.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Preload worker ended abnormally: {}", e);
        }
    }
}

/// Background task that warms the cache for anticipated prompts through the
/// same `ask` path foreground callers use.
pub struct PreloadWorker {
    assistant: Arc<Assistant>,
    queue: mpsc::Receiver<String>,
    // Holds the queue open once every handle is gone.
    _keepalive: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: watch::Sender<PreloadState>,
    poll_timeout: Duration,
    idle_backoff: Duration,
}

impl PreloadWorker {
    pub fn spawn(assistant: Arc<Assistant>, config: &PreloadConfig) -> PreloadHandle {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        for prompt in &config.prompts {
            if tx.try_send(prompt.clone()).is_err() {
                warn!("Preload queue full, dropping {:?}", prompt);
            }
        }

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PreloadState::Idle);
        let worker = PreloadWorker {
            assistant,
            queue: rx,
            _keepalive: tx.clone(),
            cancel: cancel.clone(),
            state: state_tx,
            poll_timeout: config.poll_timeout(),
            idle_backoff: config.idle_backoff(),
        };
        let task = tokio::spawn(worker.run());

        PreloadHandle { queue: tx, cancel, state: state_rx, task }
    }

    async fn run(mut self) {
        info!("Preload worker started");
        loop {
            self.set_state(PreloadState::Idle);
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = tokio::time::timeout(self.poll_timeout, self.queue.recv()) => next,
            };

            match next {
                Ok(Some(prompt)) => {
                    self.set_state(PreloadState::Draining);
                    // Not raced against cancellation: a started warm-up finishes.
                    self.warm(&prompt).await;
                }
                // The worker holds a sender, so this is an empty queue too.
                Ok(None) | Err(_) => {
                    self.set_state(PreloadState::Sleeping);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
            }
        }
        self.set_state(PreloadState::Stopped);
        info!("Preload worker stopped");
    }

    async fn warm(&self, prompt: &str) {
        if self.assistant.is_cached(prompt, &RequestParams::default()) {
            debug!("Already cached, skipping preload: {}", prompt);
            return;
        }
        debug!("Preloading: {}", prompt);
        if let Err(e) = self.assistant.ask(prompt, AskOptions::default(), None).await {
            warn!("Preload of {:?} failed: {}", prompt, e);
        }
    }

    fn set_state(&self, state: PreloadState) {
        self.state.send_replace(state);
    }
}
