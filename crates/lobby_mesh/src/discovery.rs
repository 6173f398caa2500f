//! Discovery-layer abstraction and the mDNS production adapter.
//!
//! The session logic talks to a `Discovery` trait (publish / withdraw) and a
//! stream of `DiscoveryEvent`s; `MdnsDiscovery` implements both over mdns-sd.
//! Browse events are translated on a background task and fed into the single
//! session channel, so all handling stays on one consumer.

use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::records::{PeerRecord, ServiceKey, ServiceKind};

/// TXT key on candidate records: `1` when the node may host.
pub const CAN_HOST_KEY: &str = "can-host";
/// TXT key on host records: the multiplayer WAD to join with.
pub const WAD_KEY: &str = "wad";

#[derive(Debug, Error)]
pub enum PublishError {
    /// The requested name is already taken; recover by renaming.
    #[error("service name already in use")]
    Collision,
    /// The discovery daemon is unusable; fatal to the process.
    #[error("discovery transport failure: {0}")]
    Transport(String),
}

/// Opaque handle to a live publication; needed to withdraw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishHandle {
    pub(crate) fullname: String,
}

/// A record this node wants published.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub kind: ServiceKind,
    pub name: String,
    pub port: u16,
    pub txt: Vec<(String, String)>,
}

/// What the browse tasks deliver to the session loop.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A record of either kind resolved; the key's kind says which.
    Resolved(PeerRecord),
    /// A record disappeared from the network.
    Removed(ServiceKey),
    /// The discovery daemon is gone; unrecoverable.
    TransportFailed(String),
}

/// The discovery service consumed by the advertisement manager.
pub trait Discovery: Send + Sync {
    fn publish(&self, ad: &Advertisement) -> Result<PublishHandle, PublishError>;
    fn withdraw(&self, handle: &PublishHandle);
}

/// Production adapter over the mdns-sd service daemon.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
}

impl MdnsDiscovery {
    pub fn new() -> Result<Self, PublishError> {
        let daemon = ServiceDaemon::new().map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(Self { daemon })
    }

    /// Browse one record kind and translate events onto the session channel.
    /// Runs until the daemon's channel closes, which is reported as a
    /// transport failure.
    pub fn spawn_browser(
        &self,
        kind: ServiceKind,
        tx: UnboundedSender<DiscoveryEvent>,
    ) -> Result<tokio::task::JoinHandle<()>, PublishError> {
        let receiver = self
            .daemon
            .browse(kind.service_type())
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let handle = tokio::spawn(async move {
            loop {
                match tokio::time::timeout(Duration::from_secs(5), async { receiver.recv().ok() })
                    .await
                {
                    Ok(Some(event)) => {
                        if !forward_event(kind, event, &tx) {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(DiscoveryEvent::TransportFailed(format!(
                            "{kind} browse channel closed"
                        )));
                        break;
                    }
                    Err(_) => {
                        // Timeout, just loop again
                    }
                }
            }
        });

        Ok(handle)
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.shutdown() {
            debug!("mDNS daemon shutdown: {e}");
        }
    }
}

impl Discovery for MdnsDiscovery {
    fn publish(&self, ad: &Advertisement) -> Result<PublishHandle, PublishError> {
        let host = crate::advert::local_hostname();

        let info = ServiceInfo::new(
            ad.kind.service_type(),
            &ad.name,
            &format!("{host}.local."),
            "",
            ad.port,
            &ad.txt[..],
        )
        .map_err(|e| PublishError::Transport(e.to_string()))?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();

        self.daemon
            .register(info)
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        info!("published {} record '{}' on port {}", ad.kind, ad.name, ad.port);
        Ok(PublishHandle { fullname })
    }

    fn withdraw(&self, handle: &PublishHandle) {
        if let Err(e) = self.daemon.unregister(&handle.fullname) {
            warn!("failed to unregister {}: {e}", handle.fullname);
        }
    }
}

/// Translate one mdns-sd event. Returns false when the task should stop.
fn forward_event(
    kind: ServiceKind,
    event: ServiceEvent,
    tx: &UnboundedSender<DiscoveryEvent>,
) -> bool {
    match event {
        ServiceEvent::ServiceResolved(info) => {
            let Some(name) = instance_name(info.get_fullname(), kind) else {
                debug!("ignoring foreign record {}", info.get_fullname());
                return true;
            };

            let mut record = PeerRecord::new(
                ServiceKey::new(&name, kind),
                info.get_hostname(),
                info.get_port(),
            );
            let props = info.get_properties();
            record.can_host = props
                .get(CAN_HOST_KEY)
                .map(|v| v.val_str() == "1")
                .unwrap_or(false);
            record.wad = props.get(WAD_KEY).map(|v| v.val_str().to_string());

            debug!(
                "resolved {} '{}' at {}:{} (can-host={})",
                kind, name, record.hostname, record.port, record.can_host
            );
            tx.send(DiscoveryEvent::Resolved(record)).is_ok()
        }
        ServiceEvent::ServiceRemoved(_ty, fullname) => {
            let Some(name) = instance_name(&fullname, kind) else {
                return true;
            };
            debug!("removed {} '{}'", kind, name);
            tx.send(DiscoveryEvent::Removed(ServiceKey::new(&name, kind)))
                .is_ok()
        }
        ServiceEvent::SearchStarted(ty) => {
            debug!("browse started for {ty}");
            true
        }
        _ => true,
    }
}

/// Extract the instance name from an mDNS fullname
/// (`instance._doomlobby-client._udp.local.` -> `instance`).
fn instance_name(fullname: &str, kind: ServiceKind) -> Option<String> {
    fullname
        .strip_suffix(kind.service_type())
        .and_then(|s| s.strip_suffix('.'))
        .map(|s| s.to_string())
}

/// In-memory discovery for tests: records publications and withdrawals, and
/// rejects scripted names with a collision.
#[derive(Default)]
pub struct MockDiscovery {
    inner: std::sync::Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    colliding: std::collections::HashSet<String>,
    published: Vec<Advertisement>,
    withdrawn: Vec<PublishHandle>,
    transport_down: bool,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `publish` report a collision for this name.
    pub fn collide_on(&self, name: &str) {
        self.inner.lock().unwrap().colliding.insert(name.to_string());
    }

    pub fn fail_transport(&self) {
        self.inner.lock().unwrap().transport_down = true;
    }

    pub fn published(&self) -> Vec<Advertisement> {
        self.inner.lock().unwrap().published.clone()
    }

    pub fn withdrawn(&self) -> Vec<PublishHandle> {
        self.inner.lock().unwrap().withdrawn.clone()
    }
}

impl Discovery for MockDiscovery {
    fn publish(&self, ad: &Advertisement) -> Result<PublishHandle, PublishError> {
        let mut state = self.inner.lock().unwrap();
        if state.transport_down {
            return Err(PublishError::Transport("daemon unreachable".into()));
        }
        if state.colliding.contains(&ad.name) {
            return Err(PublishError::Collision);
        }
        state.published.push(ad.clone());
        Ok(PublishHandle {
            fullname: format!("{}.{}", ad.name, ad.kind.service_type()),
        })
    }

    fn withdraw(&self, handle: &PublishHandle) {
        self.inner.lock().unwrap().withdrawn.push(handle.clone());
    }
}
