use anyhow::Result;
use axum::Router;
use clap::Parser;
use ranking::RankerConfig;
use server::build_app;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index snapshot (JSON) path
    #[arg(long, default_value = "./index.json")]
    index: String,
    /// Ranker configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RankerConfig::from_file(path)?,
        None => RankerConfig::default(),
    };
    tracing::info!(strategy = %config.default_strategy, result_limit = config.result_limit, "ranker configured");
    let app: Router = build_app(&args.index, config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
