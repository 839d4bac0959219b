//! Named, loader-backed caches with a two-tier local cache and a
//! consistent-hash-driven peer fetch path.

mod error;
mod group;
mod metrics;
mod registry;
mod roles;

pub use error::GroupError;
pub use group::{Group, GroupConfig};
pub use metrics::{GroupMetrics, GroupMetricsSnapshot};
pub use registry::GroupRegistry;
pub use roles::{FnLoader, Loader, NoPeers, PeerGetter, PeerPicker};
