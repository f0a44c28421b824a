#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dicee_room_server::identity::AcceptAllVerifier;
use dicee_room_server::metrics::Metrics;
use dicee_room_server::{config, logging, server};

/// Authoritative multiplayer game-room core for a turn-based dice game.
#[derive(Parser, Debug)]
#[command(name = "dicee-room-server")]
#[command(about = "Game-room actor server for the dicee multiplayer dice game")]
#[command(version)]
struct Cli {
    /// Path to a JSON configuration file. Falls back to built-in defaults.
    #[arg(long, short = 'f')]
    config: Option<PathBuf>,

    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load(cli.config.as_deref());

    if cli.print_config {
        let cfg = cfg?;
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    if cli.validate_config {
        match cfg {
            Ok(cfg) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.server.port);
                println!("  Default max players: {}", cfg.server.default_max_players);
                println!("  Turn timeout: {}s", cfg.server.turn_timeout_seconds);
                println!("  CORS origins: {}", cfg.server.cors_origins);
                return Ok(());
            }
            Err(error) => {
                eprintln!("Configuration validation failed:\n{error}");
                std::process::exit(1);
            }
        }
    }

    let cfg = cfg?;
    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    tracing::info!(%addr, "starting dicee room server");

    let metrics = Arc::new(Metrics::new());
    let identity: Arc<dyn dicee_room_server::identity::IdentityVerifier> = Arc::new(AcceptAllVerifier);
    let directory = server::build_directory(metrics.clone());
    let router = server::create_router(directory.clone(), identity, metrics, &cfg);

    tokio::spawn(server::run_alarm_sweep(directory, Duration::from_secs(1)));

    server::run_server(addr, router).await
}
