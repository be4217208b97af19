use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hubrelay::cli::{Cli, Commands, UserTokenCommands};
use hubrelay::config::{self, Config};
use hubrelay::github::auth::TokenIssuer;
use hubrelay::{api, github, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = config::load()?;
    let args = Cli::parse();

    match args.command {
        None => run_server(cfg, None).await,
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Installations) => print_installations(&cfg).await,
        Some(Commands::UserToken { command }) => handle_user_token_command(&cfg, command).await,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "hubrelay=debug,tower_http=debug".into()),
    );
    let json = std::env::var("HUBRELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);
    tracing::info!(app_id = cfg.app_id, callback = %cfg.callback_uri(), "starting hubrelay");

    let state = Arc::new(AppState::build(cfg).await?);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("hubrelay listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn print_installations(cfg: &Config) -> anyhow::Result<()> {
    let issuer = TokenIssuer::new(
        cfg.app_id,
        &cfg.private_key,
        &cfg.github_api_url,
        github::http_client()?,
    )?;
    let installations = issuer.list_installations().await?;

    if installations.is_empty() {
        println!("No installations found.");
        return Ok(());
    }
    println!("{:<12} ACCOUNT", "ID");
    for installation in installations {
        println!("{:<12} {}", installation.id, installation.account.login);
    }
    Ok(())
}

async fn handle_user_token_command(cfg: &Config, command: UserTokenCommands) -> anyhow::Result<()> {
    match command {
        UserTokenCommands::Remove { username } => {
            if cfg.database_url.is_none() {
                anyhow::bail!("DATABASE_URL is not set; there is no persistent token store to modify");
            }
            let store = hubrelay::open_user_token_store(cfg).await?;
            if store.delete_user_token(&username).await? {
                println!("Removed token for {}", username);
            } else {
                println!("No token stored for {}", username);
            }
        }
    }
    Ok(())
}
