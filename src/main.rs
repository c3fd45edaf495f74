use llm_accel::{AskOptions, Assistant, AssistantConfig};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AssistantConfig::from_file(path)?,
        None => AssistantConfig::default(),
    };

    let assistant = Assistant::connect(config).await?;
    let preloader = assistant.start_preloading();

    let questions = ["Hello, who are you?", "What time is it?", "Hello, who are you?"];
    for question in questions {
        println!("You: {}", question);
        print!("AI: ");
        let mut sink = |chunk: &str| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        };
        match assistant.ask(question, AskOptions::default().with_context(), Some(&mut sink)).await {
            Ok(_) => println!("\n"),
            Err(e) => println!("\n[error: {}]\n", e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&assistant.metrics())?);

    if let Some(preloader) = preloader {
        preloader.shutdown().await;
    }
    Ok(())
}
