//! storefront-session CLI binary entry point.

use clap::Parser;
use storefront_session::cli::{Cli, Commands};
use storefront_session::config::StorefrontConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_session=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    use storefront_session::cli::session;

    // Status only reads the state file; everything else talks to the backend.
    let config = StorefrontConfig::from_env;
    match command {
        Commands::Status => session::handle_status().await,
        Commands::Login(args) => {
            session::handle_login(&config()?, &args.email, &args.password).await
        }
        Commands::Logout => session::handle_logout(&config()?).await,
        Commands::Refresh => session::handle_refresh(&config()?).await,
        Commands::Watch => session::handle_watch(&config()?).await,
    }
}
