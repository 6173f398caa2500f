//! Local advertisement slots and name-collision recovery.
//!
//! Exactly two publication slots exist: the candidate record (always active
//! once the transport is up) and the host record (active only while hosting).
//! Both derive their instance name from the durable machine identity; a name
//! collision picks an alternative name and retries until one sticks.

use std::sync::Arc;

use tracing::{info, warn};

use crate::discovery::{Advertisement, Discovery, PublishError, PublishHandle, CAN_HOST_KEY, WAD_KEY};
use crate::records::ServiceKind;

struct AdvertSlot {
    kind: ServiceKind,
    name: Option<String>,
    port: u16,
    txt: Vec<(String, String)>,
    handle: Option<PublishHandle>,
}

impl AdvertSlot {
    fn new(kind: ServiceKind, port: u16) -> Self {
        Self {
            kind,
            name: None,
            port,
            txt: Vec::new(),
            handle: None,
        }
    }
}

pub struct AdvertManager<D: Discovery> {
    discovery: Arc<D>,
    base_name: String,
    candidate: AdvertSlot,
    host: AdvertSlot,
}

impl<D: Discovery> AdvertManager<D> {
    pub fn new(discovery: Arc<D>, base_name: &str, port: u16, can_host: bool) -> Self {
        let mut candidate = AdvertSlot::new(ServiceKind::Candidate, port);
        candidate.txt = vec![(
            CAN_HOST_KEY.to_string(),
            if can_host { "1" } else { "0" }.to_string(),
        )];

        Self {
            discovery,
            base_name: base_name.to_string(),
            candidate,
            host: AdvertSlot::new(ServiceKind::Host, port),
        }
    }

    /// Publish the candidate record. Idempotent once established.
    pub fn publish_candidate(&mut self) -> Result<(), PublishError> {
        publish_slot(&*self.discovery, &self.base_name, &mut self.candidate)
    }

    /// Publish the host record carrying the multiplayer WAD. Idempotent.
    pub fn publish_host(&mut self, wad: &str) -> Result<(), PublishError> {
        self.host.txt = vec![(WAD_KEY.to_string(), wad.to_string())];
        publish_slot(&*self.discovery, &self.base_name, &mut self.host)
    }

    /// Withdraw the host record if it is published; no-op otherwise.
    pub fn withdraw_host(&mut self) {
        if let Some(handle) = self.host.handle.take() {
            info!("withdrawing host record");
            self.discovery.withdraw(&handle);
        }
    }

    /// Withdraw everything, for shutdown.
    pub fn withdraw_all(&mut self) {
        self.withdraw_host();
        if let Some(handle) = self.candidate.handle.take() {
            self.discovery.withdraw(&handle);
        }
    }

    /// Whether a browsed record name is one of our own publications. This is
    /// how resolved records get their `is_self` flag.
    pub fn owns(&self, name: &str) -> bool {
        self.candidate.name.as_deref() == Some(name) || self.host.name.as_deref() == Some(name)
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.candidate.name.as_deref()
    }
}

/// Publish one slot, renaming on collision until a name is accepted.
/// An explicit loop: rename storms must not grow the stack.
fn publish_slot<D: Discovery>(
    discovery: &D,
    base_name: &str,
    slot: &mut AdvertSlot,
) -> Result<(), PublishError> {
    if slot.handle.is_some() {
        return Ok(());
    }

    loop {
        let name = slot
            .name
            .get_or_insert_with(|| base_name.to_string())
            .clone();

        let ad = Advertisement {
            kind: slot.kind,
            name: name.clone(),
            port: slot.port,
            txt: slot.txt.clone(),
        };

        match discovery.publish(&ad) {
            Ok(handle) => {
                slot.handle = Some(handle);
                return Ok(());
            }
            Err(PublishError::Collision) => {
                let renamed = alternative_name(&name);
                warn!("name collision on '{name}', renaming {} record to '{renamed}'", slot.kind);
                slot.name = Some(renamed);
            }
            Err(e @ PublishError::Transport(_)) => return Err(e),
        }
    }
}

/// Derive an alternative instance name: `foo` -> `foo #2` -> `foo #3` -> ...
pub fn alternative_name(name: &str) -> String {
    if let Some((stem, suffix)) = name.rsplit_once(" #") {
        if let Ok(n) = suffix.parse::<u32>() {
            return format!("{stem} #{}", n + 1);
        }
    }
    format!("{name} #2")
}

pub(crate) fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "doomlobby-node".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MockDiscovery;

    fn manager(mock: &Arc<MockDiscovery>) -> AdvertManager<MockDiscovery> {
        AdvertManager::new(mock.clone(), "machine-a", 5029, true)
    }

    #[test]
    fn alternative_names_increment() {
        assert_eq!(alternative_name("game"), "game #2");
        assert_eq!(alternative_name("game #2"), "game #3");
        assert_eq!(alternative_name("game #9"), "game #10");
        // Non-numeric suffix is not a rename marker
        assert_eq!(alternative_name("game #x"), "game #x #2");
    }

    #[test]
    fn candidate_carries_can_host_flag() {
        let mock = Arc::new(MockDiscovery::new());
        let mut mgr = manager(&mock);
        mgr.publish_candidate().unwrap();

        let published = mock.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].kind, ServiceKind::Candidate);
        assert_eq!(published[0].txt, vec![("can-host".to_string(), "1".to_string())]);
        assert_eq!(mgr.candidate_name(), Some("machine-a"));
    }

    #[test]
    fn collision_renames_until_accepted() {
        let mock = Arc::new(MockDiscovery::new());
        mock.collide_on("machine-a");
        mock.collide_on("machine-a #2");

        let mut mgr = manager(&mock);
        mgr.publish_candidate().unwrap();

        assert_eq!(mgr.candidate_name(), Some("machine-a #3"));
        assert_eq!(mock.published().len(), 1);
        assert_eq!(mock.published()[0].name, "machine-a #3");
    }

    #[test]
    fn publish_is_idempotent() {
        let mock = Arc::new(MockDiscovery::new());
        let mut mgr = manager(&mock);
        mgr.publish_candidate().unwrap();
        mgr.publish_candidate().unwrap();
        assert_eq!(mock.published().len(), 1);
    }

    #[test]
    fn host_record_lifecycle() {
        let mock = Arc::new(MockDiscovery::new());
        let mut mgr = manager(&mock);
        mgr.publish_host("freedm.wad").unwrap();

        let published = mock.published();
        assert_eq!(published[0].kind, ServiceKind::Host);
        assert_eq!(published[0].txt, vec![("wad".to_string(), "freedm.wad".to_string())]);

        mgr.withdraw_host();
        mgr.withdraw_host(); // no-op
        assert_eq!(mock.withdrawn().len(), 1);
    }

    #[test]
    fn owns_matches_either_slot() {
        let mock = Arc::new(MockDiscovery::new());
        let mut mgr = manager(&mock);
        assert!(!mgr.owns("machine-a"));

        mgr.publish_candidate().unwrap();
        assert!(mgr.owns("machine-a"));
        assert!(!mgr.owns("machine-b"));

        mgr.publish_host("freedm.wad").unwrap();
        assert!(mgr.owns("machine-a"));
    }

    #[test]
    fn transport_failure_is_fatal() {
        let mock = Arc::new(MockDiscovery::new());
        mock.fail_transport();
        let mut mgr = manager(&mock);
        assert!(matches!(
            mgr.publish_candidate(),
            Err(PublishError::Transport(_))
        ));
    }
}
