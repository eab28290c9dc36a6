use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Target};
use log::LevelFilter;
use reelshop_core::FeedConfig;
use reelshop_player::cli::Cli;
use reelshop_player::commands;

fn init_logger() {
    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module("reelshop_player", LevelFilter::Info)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Ignoring unreadable .env: {err}");
    }

    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = FeedConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => FeedConfig::load(),
    };
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    log::debug!("Using API at {}", config.api_base_url);

    commands::execute(cli.command, &config).await
}
