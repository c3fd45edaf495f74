use llm_accel::{AskOptions, Assistant, AssistantConfig};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

// Helper to kill children on exit
struct ProcessGuard(Child);
impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    // Assumes binaries are already built by a previous `cargo build`
    let _server = ProcessGuard(
        Command::new("./target/debug/mock_ollama")
            .args(["3011", "50", "0.1", "5"])
            .spawn()?,
    );
    println!("Mock server started on 3011. Waiting 2s...");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut config = AssistantConfig::default();
    config.base_url = "http://127.0.0.1:3011".to_string();
    config.timeout_secs = 5;
    config.optimization.cache_max_size = 32;
    config.optimization.replay_delay_ms = 0;
    config.preload.idle_backoff_ms = 200;

    let assistant = Assistant::connect(config).await?;
    let preloader = assistant.start_preloading();

    println!("Starting load test (200 concurrent requests)...");
    let answered = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start_time = Instant::now();

    let mut tasks = Vec::new();
    for i in 0..200 {
        let assistant = Arc::clone(&assistant);
        let answered = Arc::clone(&answered);
        let failed = Arc::clone(&failed);
        // Half the traffic repeats a small prompt set so the cache gets hits.
        let prompt = if i % 2 == 0 { format!("common prompt {}", i % 5) } else { format!("unique prompt {}", i) };

        tasks.push(task::spawn(async move {
            let mut chunks = 0usize;
            let mut sink = |_: &str| chunks += 1;
            match assistant.ask(&prompt, AskOptions::default(), Some(&mut sink)).await {
                Ok(_) => answered.fetch_add(1, Ordering::Relaxed),
                Err(_) => failed.fetch_add(1, Ordering::Relaxed),
            };
        }));
    }

    for t in tasks {
        let _ = t.await;
    }

    let duration = start_time.elapsed();
    println!("--- Results ---");
    println!("Answered: {}", answered.load(Ordering::Relaxed));
    println!("Failed: {}", failed.load(Ordering::Relaxed));
    println!("Total Time: {:?}", duration);
    println!("RPS: {:.2}", 200.0 / duration.as_secs_f64());
    println!("{}", serde_json::to_string_pretty(&assistant.metrics())?);
    let store = assistant.cache().stats();
    println!(
        "Cache store: {} hits, {} misses ({:.1}% hit ratio), {} evictions, {} expired",
        store.hits,
        store.misses,
        store.hit_ratio() * 100.0,
        store.evictions,
        store.expired
    );

    if let Some(preloader) = preloader {
        println!("Preload worker state: {:?}", preloader.state());
        preloader.shutdown().await;
    }
    Ok(())
}
