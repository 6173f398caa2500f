//! LAN discovery for the session launcher: record types, the sorted peer
//! registry, the discovery-service abstraction with its mDNS adapter, and the
//! local advertisement manager.

pub mod advert;
pub mod discovery;
pub mod records;
pub mod registry;

pub use advert::AdvertManager;
pub use discovery::{Discovery, DiscoveryEvent, MdnsDiscovery, MockDiscovery, PublishError};
pub use records::{PeerRecord, ServiceKey, ServiceKind};
pub use registry::PeerRegistry;
