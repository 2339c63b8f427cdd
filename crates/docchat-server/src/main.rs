use anyhow::{Context, Result};
use clap::Parser;
use docchat_server::{AppState, DirUserRepository, router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docchat-server")]
#[command(about = "DocChat user service", long_about = None)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Directory for stored user records. Defaults to the platform data
    /// directory, e.g. ~/.local/share/docchat.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("could not determine the platform data directory")?
            .join("docchat"),
    };

    let users = DirUserRepository::new(&data_dir)
        .await
        .with_context(|| format!("failed to open user store at {}", data_dir.display()))?;

    let app = router(AppState {
        users: Arc::new(users),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;

    tracing::info!(port = args.port, data_dir = %data_dir.display(), "docchat-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
