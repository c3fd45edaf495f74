use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use llm_accel::model::{ChatFrame, ChatRequest, Message};
use rand::Rng;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone)]
struct ServerConfig {
    latency_ms: u64,
    chunk_delay_ms: u64,
    error_rate: f64,
}

// Usage: mock_ollama [port] [latency_ms] [error_rate] [chunk_delay_ms]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let port = args.get(1).map(|s| s.parse::<u16>()).transpose()?.unwrap_or(11434);
    let latency_ms = args.get(2).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(200);
    let error_rate = args.get(3).map(|s| s.parse::<f64>()).transpose()?.unwrap_or(0.0);
    let chunk_delay_ms = args.get(4).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(20);

    let config = ServerConfig { latency_ms, chunk_delay_ms, error_rate };

    let app = Router::new()
        .route("/api/tags", get(tags))
        .route("/api/chat", post(chat))
        .with_state(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!(
        "Mock inference server on localhost:{}. Latency: {}ms, Error Rate: {}",
        port, latency_ms, error_rate
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn tags() -> Json<serde_json::Value> {
    Json(json!({ "models": [{ "name": "llama3.2:1b" }, { "name": "phi3" }] }))
}

async fn chat(State(config): State<ServerConfig>, Json(req): Json<ChatRequest>) -> Response {
    let jitter = rand::thread_rng().gen_range(0..=20);
    sleep(Duration::from_millis(config.latency_ms + jitter)).await;

    if config.error_rate > 0.0 && rand::thread_rng().gen_bool(config.error_rate) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "simulated failure" })))
            .into_response();
    }

    let prompt = req.messages.last().map(|m| m.content.as_str()).unwrap_or("");
    let answer = format!(
        "You asked about \"{}\" using {} with {} earlier messages.",
        prompt,
        req.model,
        req.messages.len().saturating_sub(1)
    );

    if !req.stream {
        let frame = ChatFrame { message: Some(Message::assistant(answer)), done: true };
        return Json(frame).into_response();
    }

    let mut lines: Vec<String> = llm_accel::stream::chunk_words(&answer, 2)
        .into_iter()
        .map(|chunk| ndjson_line(&ChatFrame::delta(chunk)))
        .collect();
    lines.push(ndjson_line(&ChatFrame::done()));

    let delay = Duration::from_millis(config.chunk_delay_ms);
    let body = futures::stream::iter(lines).then(move |line| async move {
        sleep(delay).await;
        Ok::<_, Infallible>(line)
    });

    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn ndjson_line(frame: &ChatFrame) -> String {
    let mut line = serde_json::to_string(frame).unwrap_or_default();
    line.push('\n');
    line
}
