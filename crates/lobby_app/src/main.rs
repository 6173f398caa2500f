use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lobby_launcher::Supervisor;
use lobby_mesh::{AdvertManager, MdnsDiscovery, ServiceKind};
use lobby_session::{ElectionTimer, Event, Outcome, SessionController};

mod config;
mod identity;

use config::LauncherConfig;

/// Zero-configuration LAN game session launcher.
#[derive(Debug, Parser)]
#[command(name = "doomlobby", version)]
struct Cli {
    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = LauncherConfig::load(cli.config.as_deref())?;

    info!("doomlobby starting...");
    info!("binary    = {}", config.game.binary);
    info!("port      = {}", config.multiplayer.port);
    info!("can-host  = {}", config.multiplayer.can_host);
    info!("wait      = {}s", config.multiplayer.wait);

    // Every event source feeds this one channel; the controller is the only
    // consumer, so handlers never interleave.
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let discovery = Arc::new(MdnsDiscovery::new().context("start mDNS daemon")?);

    // Browse both record kinds and forward onto the session channel.
    let (disc_tx, mut disc_rx) = mpsc::unbounded_channel();
    for kind in [ServiceKind::Candidate, ServiceKind::Host] {
        discovery
            .spawn_browser(kind, disc_tx.clone())
            .with_context(|| format!("browse {kind} records"))?;
    }
    drop(disc_tx);
    let disc_fwd = tx.clone();
    tokio::spawn(async move {
        while let Some(event) = disc_rx.recv().await {
            if disc_fwd.send(Event::Discovery(event)).is_err() {
                break;
            }
        }
    });

    // Game process exits take the same route.
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let exit_fwd = tx.clone();
    tokio::spawn(async move {
        while let Some(notice) = exit_rx.recv().await {
            if exit_fwd.send(Event::GameExited(notice)).is_err() {
                break;
            }
        }
    });

    let name = identity::machine_name();
    info!("identity  = {name}");

    let adverts = AdvertManager::new(
        discovery.clone(),
        &name,
        config.multiplayer.port,
        config.multiplayer.can_host,
    );
    let supervisor = Supervisor::new(exit_tx);
    let timer = ElectionTimer::new(tx.clone(), config.quiet_period());

    let mut controller = SessionController::new(adverts, supervisor, timer, config.launch_plan());
    controller.start().await.context("start session")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };
                if controller.handle(event).await? == Outcome::Shutdown {
                    break;
                }
            }
        }
    }

    controller.shutdown();
    discovery.shutdown();
    Ok(())
}
