use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sdsim_car::config::Config;
use sdsim_car::net::start_websocket_server;
use sdsim_car::state::SharedGameState;

/// Single-car simulation server
#[derive(Parser)]
#[command(name = "sdsim-car")]
#[command(version)]
struct Cli {
    /// JSON config file (defaults are used for anything it leaves out)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the websocket listen address
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting car server...");

    let mut config = Config::load(cli.config.as_deref()).context("loading config")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let state = Arc::new(Mutex::new(
        SharedGameState::new(&config).context("building car")?,
    ));

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;

    tokio::spawn(start_websocket_server(listener, Arc::clone(&state)));

    // Fixed physics tick + independent render tick. Both lock the same
    // state, so they never interleave with each other or with clients.
    let mut fixed = interval(Duration::from_secs_f32(config.server.fixed_dt()));
    let mut render = interval(Duration::from_secs_f32(1.0 / config.server.render_hz));
    fixed.set_missed_tick_behavior(MissedTickBehavior::Burst);
    render.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "⏱️ Fixed tick {} Hz, render tick {} Hz",
        config.server.fixed_hz, config.server.render_hz
    );

    loop {
        tokio::select! {
            _ = fixed.tick() => {
                state.lock().await.fixed_tick();
            }
            _ = render.tick() => {
                state.lock().await.render_tick();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("👋 Shutting down");
                return Ok(());
            }
        }
    }
}
