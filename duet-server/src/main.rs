use clap::Parser;
use duet_server::{ChatStore, DuetConfig, MemoryChatStore, SqliteChatStore, build_router, start};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "duet-server", version, about = "Signaling server for two-party video calls")]
struct Args {
    /// Config file (defaults to ./duet.toml when present)
    #[arg(long, env = "DUET_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duet_server=info,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let mut config = DuetConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let store: Arc<dyn ChatStore> = match &config.storage.database_url {
        Some(url) => Arc::new(SqliteChatStore::connect(url, config.storage.max_connections).await?),
        None => {
            info!("No database configured, chat history is kept in memory");
            Arc::new(MemoryChatStore::new())
        }
    };

    let state = start(&config, store);
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Duet server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
