//! Single-child process supervisor.
//!
//! At most one game process exists at any time. Launching while a child is
//! running terminates the old child and reaps it before the new one starts.
//! Exits are reported over the session channel tagged with a generation
//! number, so a replaced child's exit is never mistaken for the current one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::{debug, info};

use crate::command::GameCommand;

pub type Generation = u64;

/// Delivered on the session channel when a child terminates on its own.
#[derive(Debug, Clone, Copy)]
pub struct ExitNotice {
    pub generation: Generation,
    pub code: Option<i32>,
}

/// Seam between the session controller and process execution.
#[async_trait]
pub trait Launcher: Send {
    /// Start a game process, replacing any current one. Spawn failure is
    /// fatal; there is no recovery without a working launcher binary.
    async fn launch(&mut self, cmd: GameCommand) -> Result<Generation>;

    /// Generation of the currently tracked child, if any.
    fn current(&self) -> Option<Generation>;

    /// Forget the tracked child after its exit notice was handled.
    fn clear(&mut self, generation: Generation);
}

struct RunningChild {
    generation: Generation,
    kill_tx: oneshot::Sender<()>,
    reaped: tokio::task::JoinHandle<()>,
}

pub struct Supervisor {
    exits: UnboundedSender<ExitNotice>,
    current: Option<RunningChild>,
    next_generation: Generation,
}

impl Supervisor {
    pub fn new(exits: UnboundedSender<ExitNotice>) -> Self {
        Self {
            exits,
            current: None,
            next_generation: 1,
        }
    }
}

#[async_trait]
impl Launcher for Supervisor {
    async fn launch(&mut self, cmd: GameCommand) -> Result<Generation> {
        if let Some(prev) = self.current.take() {
            debug!("terminating previous child (generation {})", prev.generation);
            let _ = prev.kill_tx.send(());
            // Bounded wait: the watch task kills and reaps, then returns.
            let _ = prev.reaped.await;
        }

        info!("launching {cmd}");
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn game process '{}'", cmd.program))?;

        let generation = self.next_generation;
        self.next_generation += 1;
        debug!("child pid {:?}, generation {generation}", child.id());

        let (kill_tx, kill_rx) = oneshot::channel();
        let exits = self.exits.clone();
        let reaped = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let code = status.ok().and_then(|s| s.code());
                    info!("child exited with {code:?} (generation {generation})");
                    let _ = exits.send(ExitNotice { generation, code });
                }
                _ = kill_rx => {
                    // Replaced: kill and reap quietly, no exit notice.
                    let _ = child.kill().await;
                }
            }
        });

        self.current = Some(RunningChild {
            generation,
            kill_tx,
            reaped,
        });
        Ok(generation)
    }

    fn current(&self) -> Option<Generation> {
        self.current.as_ref().map(|c| c.generation)
    }

    fn clear(&mut self, generation: Generation) {
        if self.current.as_ref().map(|c| c.generation) == Some(generation) {
            self.current = None;
        }
    }
}

/// Records launch requests instead of spawning; for controller tests.
#[derive(Default)]
pub struct MockLauncher {
    launched: Vec<GameCommand>,
    current: Option<Generation>,
    next_generation: Generation,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            launched: Vec::new(),
            current: None,
            next_generation: 1,
        }
    }

    pub fn launched(&self) -> &[GameCommand] {
        &self.launched
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&mut self, cmd: GameCommand) -> Result<Generation> {
        self.launched.push(cmd);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.current = Some(generation);
        Ok(generation)
    }

    fn current(&self) -> Option<Generation> {
        self.current
    }

    fn clear(&mut self, generation: Generation) {
        if self.current == Some(generation) {
            self.current = None;
        }
    }
}
