//! Session controller: the role state machine.
//!
//! All inputs arrive as `Event`s on one channel and are handled to completion
//! by a single consumer, so the registry, advertisement slots, and role need
//! no locking. Two independent signals drive role changes: the debounced
//! election ("I should host") and host-record resolution ("someone else
//! already hosts", acted on immediately).

use anyhow::Result;
use tracing::{debug, info, warn};

use lobby_launcher::{ExitNotice, LaunchPlan, Launcher};
use lobby_mesh::{
    AdvertManager, Discovery, DiscoveryEvent, PeerRecord, PeerRegistry, ServiceKey, ServiceKind,
};

use crate::election::ElectionTimer;

/// Everything the session loop consumes.
#[derive(Debug)]
pub enum Event {
    Discovery(DiscoveryEvent),
    /// The election timer fired; the payload is its arming generation.
    ElectionDue(u64),
    GameExited(ExitNotice),
}

impl From<DiscoveryEvent> for Event {
    fn from(ev: DiscoveryEvent) -> Self {
        Self::Discovery(ev)
    }
}

impl From<ExitNotice> for Event {
    fn from(notice: ExitNotice) -> Self {
        Self::GameExited(notice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Idle,
    SinglePlayer,
    Host,
    Client,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::SinglePlayer => write!(f, "single-player"),
            Self::Host => write!(f, "host"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// What the event loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// The discovery transport disconnected; stop cleanly.
    Shutdown,
}

pub struct SessionController<D: Discovery, L: Launcher> {
    role: SessionRole,
    registry: PeerRegistry,
    current_host: Option<PeerRecord>,
    single_player_running: bool,
    adverts: AdvertManager<D>,
    launcher: L,
    timer: ElectionTimer,
    plan: LaunchPlan,
}

impl<D: Discovery, L: Launcher> SessionController<D, L> {
    pub fn new(adverts: AdvertManager<D>, launcher: L, timer: ElectionTimer, plan: LaunchPlan) -> Self {
        Self {
            role: SessionRole::Idle,
            registry: PeerRegistry::new(),
            current_host: None,
            single_player_running: false,
            adverts,
            launcher,
            timer,
            plan,
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Withdraw all advertisements; called on the way out.
    pub fn shutdown(&mut self) {
        self.adverts.withdraw_all();
    }

    /// Startup: publish our candidate record and run single-player until the
    /// network has something better to offer.
    pub async fn start(&mut self) -> Result<()> {
        self.adverts.publish_candidate()?;
        self.enter_single_player().await
    }

    pub async fn handle(&mut self, event: Event) -> Result<Outcome> {
        match event {
            Event::Discovery(DiscoveryEvent::Resolved(record)) => {
                self.on_resolved(record).await?;
            }
            Event::Discovery(DiscoveryEvent::Removed(key)) => {
                self.on_removed(key).await?;
            }
            Event::Discovery(DiscoveryEvent::TransportFailed(reason)) => {
                warn!("disconnected from discovery transport: {reason}");
                return Ok(Outcome::Shutdown);
            }
            Event::ElectionDue(generation) => {
                if self.timer.is_current(generation) {
                    self.decide_election().await?;
                } else {
                    debug!("ignoring stale election fire (generation {generation})");
                }
            }
            Event::GameExited(notice) => {
                self.on_game_exited(notice).await?;
            }
        }
        Ok(Outcome::Continue)
    }

    async fn on_resolved(&mut self, mut record: PeerRecord) -> Result<()> {
        record.is_self = self.adverts.owns(&record.key.name);

        match record.key.kind {
            ServiceKind::Candidate => {
                info!(
                    "candidate '{}' at {} (can-host={}, self={})",
                    record.key.name, record.hostname, record.can_host, record.is_self
                );
                let is_self = record.is_self;
                self.registry.upsert(record);
                // Our own advertisement is not network-variable; only other
                // peers' churn restarts the quiet period.
                if !is_self {
                    self.timer.restart();
                }
            }
            ServiceKind::Host => {
                if record.is_self {
                    debug!("ignoring our own host record");
                    return Ok(());
                }
                info!(
                    "host '{}' announced at {}:{}",
                    record.key.name, record.hostname, record.port
                );
                self.current_host = Some(record);
                // A host announcement is authoritative; no debounce.
                self.timer.cancel();
                self.enter_client().await?;
            }
        }
        Ok(())
    }

    async fn on_removed(&mut self, key: ServiceKey) -> Result<()> {
        match key.kind {
            ServiceKind::Candidate => {
                let removed = self.registry.remove(&key);
                if removed.iter().any(|p| !p.is_self) {
                    info!("candidate '{}' left", key.name);
                    self.timer.restart();
                }
            }
            ServiceKind::Host => {
                let was_current = self
                    .current_host
                    .as_ref()
                    .map(|h| h.key == key)
                    .unwrap_or(false);
                if was_current {
                    info!("host '{}' vanished, falling back", key.name);
                    self.current_host = None;
                    self.enter_single_player().await?;
                    // The authoritative host is gone; a new election must run.
                    self.timer.restart();
                }
            }
        }
        Ok(())
    }

    /// The quiet period elapsed: read the registry and decide.
    async fn decide_election(&mut self) -> Result<()> {
        let best = self
            .registry
            .best()
            .map(|b| (b.can_host, b.is_self, b.hostname.clone()));

        match best {
            Some((true, true, _)) => {
                let others = self.registry.count_others();
                if others > 0 {
                    info!("this node is the best host, hosting for {others} peers");
                    self.enter_host(others + 1).await?;
                } else {
                    info!("no peers found");
                    self.enter_single_player().await?;
                }
            }
            Some((true, false, hostname)) => {
                // The winner is remote; its host record will arrive on the
                // independent resolution path.
                info!("best host is {hostname}, waiting for its announcement");
            }
            _ => {
                info!("no suitable hosts");
                self.enter_single_player().await?;
            }
        }
        Ok(())
    }

    async fn on_game_exited(&mut self, notice: ExitNotice) -> Result<()> {
        if self.launcher.current() != Some(notice.generation) {
            debug!("stale exit notice (generation {})", notice.generation);
            return Ok(());
        }
        info!("game exited with {:?}", notice.code);
        self.launcher.clear(notice.generation);
        self.single_player_running = false;
        self.enter_single_player().await
    }

    async fn enter_single_player(&mut self) -> Result<()> {
        self.adverts.withdraw_host();
        if !self.single_player_running {
            info!("launching single-player game");
            self.launcher.launch(self.plan.single_player()).await?;
            self.single_player_running = true;
        }
        self.role = SessionRole::SinglePlayer;
        Ok(())
    }

    async fn enter_host(&mut self, players: usize) -> Result<()> {
        info!("hosting game for {players} players on port {}", self.plan.port);
        self.launcher.launch(self.plan.host(players)).await?;
        self.single_player_running = false;
        self.adverts.publish_host(&self.plan.mp_wad)?;
        self.role = SessionRole::Host;
        Ok(())
    }

    async fn enter_client(&mut self) -> Result<()> {
        let (hostname, port, wad) = match &self.current_host {
            Some(host) => (
                host.hostname.clone(),
                host.port,
                host.wad.clone().unwrap_or_else(|| self.plan.mp_wad.clone()),
            ),
            None => return Ok(()),
        };

        // A losing self-election tears its host advertisement down here.
        self.adverts.withdraw_host();
        info!("joining host at {hostname}:{port}");
        self.launcher.launch(self.plan.join(&hostname, port, &wad)).await?;
        self.single_player_running = false;
        self.role = SessionRole::Client;
        Ok(())
    }
}
