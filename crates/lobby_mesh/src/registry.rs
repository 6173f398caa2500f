//! Remote peer registry, kept sorted by the election ordering.
//!
//! Host-capable peers sort before the rest; ties break on ascending service
//! name. Every node applies the same ordering to the same candidate set, so
//! `best()` converges to the same winner everywhere without coordination.

use std::cmp::Ordering;

use crate::records::{PeerRecord, ServiceKey};

/// Total order used for sorted insertion and `best()`.
pub fn election_order(a: &PeerRecord, b: &PeerRecord) -> Ordering {
    b.can_host
        .cmp(&a.can_host)
        .then_with(|| a.key.name.cmp(&b.key.name))
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: Vec<PeerRecord>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    /// Insert or replace a candidate record. A record with the same identity
    /// is removed first since its attributes may have changed across
    /// re-resolution, then the new record goes in at its sorted position.
    pub fn upsert(&mut self, record: PeerRecord) {
        self.peers.retain(|p| p.key != record.key);
        let at = self
            .peers
            .partition_point(|p| election_order(p, &record) != Ordering::Greater);
        self.peers.insert(at, record);
    }

    /// Remove all records matching the identity, returning them.
    pub fn remove(&mut self, key: &ServiceKey) -> Vec<PeerRecord> {
        let mut removed = Vec::new();
        self.peers.retain(|p| {
            if p.key == *key {
                removed.push(p.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// First record in election order, if any.
    pub fn best(&self) -> Option<&PeerRecord> {
        self.peers.first()
    }

    /// Number of registered peers other than ourselves; this is the
    /// multiplayer player count minus one.
    pub fn count_others(&self) -> usize {
        self.peers.iter().filter(|p| !p.is_self).count()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ServiceKind;

    fn record(name: &str, can_host: bool, is_self: bool) -> PeerRecord {
        let key = ServiceKey::new(name, ServiceKind::Candidate);
        let mut r = PeerRecord::new(key, &format!("{name}.local."), 5029);
        r.can_host = can_host;
        r.is_self = is_self;
        r
    }

    fn names(reg: &PeerRegistry) -> Vec<String> {
        reg.iter().map(|p| p.key.name.clone()).collect()
    }

    #[test]
    fn host_capable_sort_first_then_by_name() {
        let mut reg = PeerRegistry::new();
        reg.upsert(record("charlie", false, false));
        reg.upsert(record("bravo", true, false));
        reg.upsert(record("alpha", true, false));
        reg.upsert(record("delta", false, false));

        assert_eq!(names(&reg), ["alpha", "bravo", "charlie", "delta"]);
        assert_eq!(reg.best().unwrap().key.name, "alpha");
    }

    #[test]
    fn upsert_replaces_same_identity() {
        let mut reg = PeerRegistry::new();
        reg.upsert(record("alpha", true, false));
        reg.upsert(record("bravo", true, false));

        // alpha re-resolves, no longer host capable
        reg.upsert(record("alpha", false, false));

        assert_eq!(reg.len(), 2);
        assert_eq!(names(&reg), ["bravo", "alpha"]);
    }

    #[test]
    fn remove_by_identity() {
        let mut reg = PeerRegistry::new();
        reg.upsert(record("alpha", true, false));
        reg.upsert(record("bravo", true, true));

        let removed = reg.remove(&ServiceKey::new("alpha", ServiceKind::Candidate));
        assert_eq!(removed.len(), 1);
        assert!(!removed[0].is_self);
        assert_eq!(reg.len(), 1);

        assert!(reg
            .remove(&ServiceKey::new("alpha", ServiceKind::Candidate))
            .is_empty());
    }

    #[test]
    fn count_others_skips_self() {
        let mut reg = PeerRegistry::new();
        reg.upsert(record("alpha", true, true));
        assert_eq!(reg.count_others(), 0);

        reg.upsert(record("bravo", false, false));
        reg.upsert(record("charlie", true, false));
        assert_eq!(reg.count_others(), 2);
    }

    #[test]
    fn ordering_is_deterministic_across_insertion_orders() {
        let mut fwd = PeerRegistry::new();
        let mut rev = PeerRegistry::new();
        let all = ["bravo", "alpha", "charlie"];

        for name in all {
            fwd.upsert(record(name, name != "charlie", false));
        }
        for name in all.iter().rev() {
            rev.upsert(record(name, *name != "charlie", false));
        }

        assert_eq!(names(&fwd), names(&rev));
        assert_eq!(fwd.best().unwrap().key.name, "alpha");
    }
}
