use anyhow::Result;
use clap::Parser;
use intake_api::server::{run_server, ApiConfig};
use intake_core::storage::Store;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Study intake engine server", long_about = None)]
struct Args {
    /// SQLite database file; created on first start.
    #[arg(long, default_value = "intake.db", env = "INTAKE_DB")]
    db: PathBuf,

    #[arg(long, default_value = "127.0.0.1", env = "INTAKE_HOST")]
    host: String,

    #[arg(long, default_value_t = 8080, env = "INTAKE_PORT")]
    port: u16,

    /// Allow cross-origin requests (development convenience).
    #[arg(long, env = "INTAKE_CORS")]
    cors: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("INTAKE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let store = Store::open(&args.db)?;
    store.init_schema()?;

    tracing::info!(
        event = "server_start",
        db = %args.db.display(),
        host = %args.host,
        port = args.port,
    );

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        enable_cors: args.cors,
    };
    run_server(&config, Some(store)).await
}
