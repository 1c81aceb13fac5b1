use std::sync::Arc;

use chat_relay::channels::SlackChannel;
use chat_relay::config::Config;
use chat_relay::error::Result;
use chat_relay::keepalive::spawn_keepalive;
use chat_relay::llm::create_provider;
use chat_relay::pipeline::MessageProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Missing credentials end the process before any handler is registered.
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Required: SLACK_BOT_TOKEN, SLACK_APP_TOKEN, SLACK_SIGNING_SECRET, OPENAI_API_KEY");
        std::process::exit(1);
    });

    let relay = &config.relay;
    eprintln!("⚡ {} v{}", relay.persona.display_name(), env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!(
        "   Dedup: {}",
        if relay.dedup_enabled {
            format!(
                "on ({} ids, {}s window)",
                relay.dedup.capacity,
                relay.dedup.ttl.as_secs()
            )
        } else {
            "off".to_string()
        }
    );
    eprintln!(
        "   Delivery: {}",
        if relay.placeholder_enabled {
            "placeholder + edit"
        } else {
            "direct post"
        }
    );

    if let Some(port) = config.keepalive_port {
        eprintln!("   Keepalive: http://0.0.0.0:{port}/healthz");
        spawn_keepalive(port);
    }

    let llm = create_provider(&config.llm)?;
    let slack = Arc::new(SlackChannel::new(&config.slack));
    let processor = Arc::new(MessageProcessor::from_config(relay, llm, slack.clone()));

    eprintln!("   Slack: Socket Mode\n");

    tokio::select! {
        result = slack.run(processor) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
