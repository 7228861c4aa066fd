use anyhow::{Context, Result, bail};
use clap::Parser;
use situ_api::config::Config;
use situ_api::prompt_loader;
use situ_api::state::AppState;
use situ_client::{CaptionClient, ChatClient};
use situ_core::{ChatGateway, Orchestrator, SessionLog, SharedSignals, TickScheduler, TickTiming};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;

/// Situational-impairment assessment service.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Address to listen on. Overrides BIND_ADDRESS.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Seconds between assessment ticks. Overrides TICK_INTERVAL_MS.
    #[arg(long)]
    interval: Option<f64>,
    /// Milliseconds to wait before the first tick. Overrides WARMUP_MS.
    #[arg(long)]
    warmup_ms: Option<u64>,
    /// Directory of `.md` prompt overrides. Overrides PROMPTS_DIR.
    #[arg(long)]
    prompts_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(seconds) = self.interval {
            if !seconds.is_finite() || seconds <= 0.0 {
                bail!("--interval must be a positive number of seconds");
            }
            config.tick_interval =
                Duration::try_from_secs_f64(seconds).context("--interval is out of range")?;
        }
        if let Some(warmup_ms) = self.warmup_ms {
            config.warmup = Duration::from_millis(warmup_ms);
        }
        if let Some(dir) = self.prompts_dir {
            config.prompts_dir = Some(dir);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    Cli::parse().apply(&mut config)?;
    tracing::info!("Configuration loaded. Starting assessment service...");

    let prompts = prompt_loader::build_prompts(config.prompts_dir.as_deref(), config.situation_variant)
        .context("Failed to load LLM prompts")?;

    let chat = Arc::new(ChatClient::new(config.chat_config()));
    let caption = config.caption_config().map(|c| Arc::new(CaptionClient::new(c)));
    if caption.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN not set; frame captioning is disabled");
    }

    let signals = SharedSignals::new();
    let log = SessionLog::new();
    let orchestrator = Arc::new(
        Orchestrator::new(ChatGateway::new(chat.clone()), signals.clone(), log.clone())
            .with_prompts(prompts)
            .with_hand_window(config.hand_window),
    );

    let scheduler = TickScheduler::spawn(
        TickTiming {
            warmup: config.warmup,
            period: config.tick_interval,
        },
        {
            let orchestrator = orchestrator.clone();
            move || {
                let orchestrator = orchestrator.clone();
                async move { orchestrator.tick().await }
            }
        },
    );

    let state = AppState::new(
        signals,
        log,
        chat,
        caption,
        scheduler.period(),
        orchestrator.gate(),
    );

    // The perception front end is served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = situ_api::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    scheduler.shutdown().await;
    tracing::info!("Assessment service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
