use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use pastabot::api::MessageApi;
use pastabot::bot::Bot;
use pastabot::config::Config;
use pastabot::error::StartupError;
use pastabot::gateway::sink::ChannelSink;
use pastabot::gateway::transport::WsTransport;
use pastabot::gateway::GatewaySession;
use pastabot::pasta::PastaStore;

#[derive(Parser)]
#[command(name = "pastabot", about = "Copypasta commands for your own messages", version)]
struct Cli {
    /// Command prefix (overrides PASTABOT_PREFIX).
    #[arg(long)]
    prefix: Option<String>,

    /// Path of the pastas JSON file (overrides PASTABOT_PASTAS_FILE).
    #[arg(long)]
    pastas_file: Option<PathBuf>,

    /// Log level for this crate; RUST_LOG takes precedence when set.
    #[arg(long, default_value = "debug")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pastabot={}", cli.log_level).into()),
        )
        .init();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(prefix) = cli.prefix {
        config.prefix = prefix;
    }
    if let Some(path) = cli.pastas_file {
        config.pastas_file = path;
    }
    print_banner(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let git_sha = env!("GIT_SHA");

    eprintln!();
    eprintln!("  \x1b[1;36mpastabot\x1b[0m \x1b[2mv{version} ({git_sha})\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mprefix\x1b[0m       {}", config.prefix);
    eprintln!("  \x1b[2mgateway\x1b[0m      {}", config.gateway_url);
    eprintln!("  \x1b[2mapi\x1b[0m          {}", config.api_url);
    eprintln!("  \x1b[2mpastas\x1b[0m       {}", config.pastas_file.display());
    eprintln!();
}

async fn run(config: Config) -> Result<(), StartupError> {
    let api = MessageApi::new(&config.api_url, &config.token);
    let me = api.current_user().await?;
    tracing::info!(user = %me.username, id = %me.id, "token accepted");

    let pastas = PastaStore::load(&config.pastas_file).await?;
    tracing::info!(count = pastas.len(), "loaded pastas");

    let (sink, events) = ChannelSink::new();
    let bot = Bot::new(api, pastas, &config.prefix).with_premium_type(me.premium_type);
    let bot = tokio::spawn(bot.run(events));

    let shutdown = CancellationToken::new();
    let gateway = GatewaySession::new(
        config.gateway(),
        WsTransport,
        Arc::new(sink),
        shutdown.clone(),
    );

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutting down");
        shutdown.cancel();
    });

    gateway.run().await;

    // The gateway held the only sink, so the bot drains what is left and stops.
    match bot.await {
        Ok(bot) => {
            if let Err(e) = bot.pastas().save().await {
                tracing::warn!("failed to save pastas on shutdown: {e}");
            }
        }
        Err(e) => tracing::error!("bot task failed: {e}"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
