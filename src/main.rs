mod api;
mod config;
mod enrich;
mod library;
mod logging;
mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "songlib", version, about = "Song library HTTP service")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Print the resolved config file path and contents.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref()).context("load config")?;
    cfg.apply_env(|k| std::env::var(k).ok())
        .context("apply environment overrides")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            logging::init(&cfg.log).context("init logging")?;
            serve(cfg).await?;
        }
        Command::Config => {
            let path = match cli.config {
                Some(p) => p,
                None => config::default_config_path().context("default config path")?,
            };
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

async fn serve(cfg: config::Config) -> anyhow::Result<()> {
    let store = storage::SqliteStore::open(&cfg.database.path).context("open song store")?;
    let info_url = cfg.info_base_url()?;
    let provider = enrich::InfoClient::new(&info_url, cfg.enrichment.timeout()?)?;
    let service = library::SongService::new(Arc::new(store), Arc::new(provider), cfg.verses.paging);

    let app = api::router(
        service,
        api::RouterOptions {
            request_timeout: cfg.server.request_timeout()?,
            serve_stub: cfg.enrichment.serve_stub,
        },
    );

    let addr = cfg.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(
        %addr,
        db = %cfg.database.path.display(),
        %info_url,
        paging = ?cfg.verses.paging,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutting down");
}
