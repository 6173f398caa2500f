//! Debounced election timer.
//!
//! Discovery churn during startup produces bursts of registry mutations; the
//! timer collapses each burst into a single election decision. Re-arming
//! cancels any pending instance, and every arm bumps a generation counter so
//! an already-queued fire from a cancelled instance is discarded on receipt.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::controller::Event;

pub struct ElectionTimer {
    tx: UnboundedSender<Event>,
    quiet: Duration,
    generation: u64,
    pending: Option<tokio::task::JoinHandle<()>>,
}

impl ElectionTimer {
    pub fn new(tx: UnboundedSender<Event>, quiet: Duration) -> Self {
        Self {
            tx,
            quiet,
            generation: 0,
            pending: None,
        }
    }

    /// Arm (or re-arm) the single-shot timer for one quiet period.
    pub fn restart(&mut self) {
        self.cancel();
        let generation = self.generation;
        let tx = self.tx.clone();
        let quiet = self.quiet;
        debug!("election timer armed for {quiet:?} (generation {generation})");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(Event::ElectionDue(generation));
        }));
    }

    /// Cancel any pending instance and invalidate in-flight fires.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    /// Whether a received fire belongs to the currently armed instance.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const QUIET: Duration = Duration::from_millis(20);

    async fn recv_due(rx: &mut mpsc::UnboundedReceiver<Event>) -> Option<u64> {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(Event::ElectionDue(generation))) => Some(generation),
            _ => None,
        }
    }

    #[tokio::test]
    async fn fires_once_after_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ElectionTimer::new(tx, QUIET);

        timer.restart();
        let generation = recv_due(&mut rx).await.expect("timer should fire");
        assert!(timer.is_current(generation));

        // Single shot: nothing further arrives.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn rearm_collapses_bursts_into_one_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ElectionTimer::new(tx, QUIET);

        for _ in 0..5 {
            timer.restart();
        }

        let generation = recv_due(&mut rx).await.expect("one fire");
        assert!(timer.is_current(generation));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), rx.recv())
                .await
                .is_err(),
            "burst of restarts must produce exactly one fire"
        );
    }

    #[tokio::test]
    async fn cancelled_fire_is_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = ElectionTimer::new(tx, Duration::from_millis(1));

        timer.restart();
        // Let the fire land in the channel, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.cancel();

        if let Some(generation) = recv_due(&mut rx).await {
            assert!(!timer.is_current(generation));
        }
    }
}
