use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct RunningMean {
    samples: u64,
    mean_secs: f64,
}

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    streaming_responses: AtomicU64,
    response_time: Mutex<RunningMean>,
}

/// Point-in-time view of the assistant's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    /// Percentage, rounded to two decimals.
    pub cache_hit_rate: f64,
    pub streaming_responses: u64,
    /// Mean seconds per request.
    pub average_response_time: f64,
    pub cache_size: usize,
    pub context_messages: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_streaming(&self) {
        self.streaming_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds one sample into the mean without keeping the sample.
    pub fn record_elapsed(&self, elapsed: Duration) {
        let mut mean = self.response_time.lock();
        mean.samples += 1;
        mean.mean_secs += (elapsed.as_secs_f64() - mean.mean_secs) / mean.samples as f64;
    }

    pub fn snapshot(&self, cache_size: usize, context_messages: usize) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_hit_rate = if total_requests == 0 {
            0.0
        } else {
            round2(cache_hits as f64 / total_requests as f64 * 100.0)
        };
        MetricsSnapshot {
            total_requests,
            cache_hits,
            cache_hit_rate,
            streaming_responses: self.streaming_responses.load(Ordering::Relaxed),
            average_response_time: self.response_time.lock().mean_secs,
            cache_size,
            context_messages,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
