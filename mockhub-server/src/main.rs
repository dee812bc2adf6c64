use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod server;

use mockhub_core::config::DEFAULT_PORT;

#[derive(Parser, Debug, Clone)]
#[command(name = "mockhub")]
#[command(author, version, about = "Mock WebSub hub for Twitch-style webhook subscriptions")]
pub struct Args {
    /// Port the hub listens on.
    #[arg(long, env = "WEBHOOK_HUB_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Public hub URL; the route is mounted on its path. Defaults to http://localhost:<port>/hub
    #[arg(long)]
    pub hub_url: Option<String>,

    /// SQLite connection URL.
    #[arg(long, env = "MOCKHUB_DATABASE_URL", default_value = "sqlite://mockhub.db")]
    pub database_url: String,

    /// How often pending verifications, removals and expiries are processed.
    #[arg(long, default_value_t = 10_000)]
    pub poll_interval_ms: u64,

    #[arg(long, short = 'v', default_value = "false")]
    pub verbose: bool,

    /// Log failed verifications and deliveries at error level.
    #[arg(long, default_value = "false")]
    pub log_errors: bool,

    /// Keep existing subscriptions instead of wiping the store on startup.
    #[arg(long, default_value = "false")]
    pub keep_db: bool,
}

fn init_tracing(verbose: bool) {
    let directive = if verbose { "mockhub=debug" } else { "mockhub=info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse().unwrap_or_default());
    fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);
    info!("Mock hub starting. port={}, keep_db={}", args.port, args.keep_db);

    server::run_server(args).await?;

    info!("Main finished. Goodbye!");
    Ok(())
}
