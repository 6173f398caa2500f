//! Discovery record types: service identity keys and resolved peer records.

/// The two record types this node browses and publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Published by every node; TXT carries `can-host`.
    Candidate,
    /// Published only by the current session host; TXT carries `wad`.
    Host,
}

impl ServiceKind {
    /// The mDNS service type string for this record kind.
    pub fn service_type(&self) -> &'static str {
        match self {
            Self::Candidate => "_doomlobby-client._udp.local.",
            Self::Host => "_doomlobby-host._udp.local.",
        }
    }

    pub fn from_service_type(ty: &str) -> Option<Self> {
        match ty {
            "_doomlobby-client._udp.local." => Some(Self::Candidate),
            "_doomlobby-host._udp.local." => Some(Self::Host),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate => write!(f, "candidate"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// Network protocol a record was seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IpProtocol {
    V4,
    V6,
    #[default]
    Unspecified,
}

/// Composite discovery identity. Two records with the same key are the same
/// service instance; re-resolution replaces the prior entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub name: String,
    pub kind: ServiceKind,
    pub domain: String,
    /// Interface index, when the transport reports one.
    pub interface: Option<u32>,
    pub protocol: IpProtocol,
}

impl ServiceKey {
    pub fn new(name: &str, kind: ServiceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            domain: "local.".to_string(),
            interface: None,
            protocol: IpProtocol::default(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// A successfully resolved remote record.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub key: ServiceKey,
    pub hostname: String,
    pub port: u16,
    /// From the candidate TXT payload; false when absent.
    pub can_host: bool,
    /// From the host TXT payload; candidates carry none.
    pub wad: Option<String>,
    /// True when the record is one of our own advertisements echoed back.
    pub is_self: bool,
}

impl PeerRecord {
    pub fn new(key: ServiceKey, hostname: &str, port: u16) -> Self {
        Self {
            key,
            hostname: hostname.to_string(),
            port,
            can_host: false,
            wad: None,
            is_self: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_service_type() {
        for kind in [ServiceKind::Candidate, ServiceKind::Host] {
            assert_eq!(ServiceKind::from_service_type(kind.service_type()), Some(kind));
        }
        assert_eq!(ServiceKind::from_service_type("_other._udp.local."), None);
    }

    #[test]
    fn keys_compare_by_full_identity() {
        let a = ServiceKey::new("alpha", ServiceKind::Candidate);
        let b = ServiceKey::new("alpha", ServiceKind::Candidate);
        assert_eq!(a, b);

        let host = ServiceKey::new("alpha", ServiceKind::Host);
        assert_ne!(a, host);

        let mut v6 = ServiceKey::new("alpha", ServiceKind::Candidate);
        v6.protocol = IpProtocol::V6;
        assert_ne!(a, v6);
    }
}
