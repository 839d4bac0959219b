use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::group::Group;
use crate::metrics::GroupMetricsSnapshot;

/// Looks up groups by name for the peer transport server.
///
/// Kept as an explicit, separately-owned handle rather than a field on
/// `Group` itself: a `Group` never holds a reference back to the registry,
/// so there is no `Group -> Peer -> Group` ownership cycle even though the
/// transport server needs to resolve an inbound request's group name back
/// to a live `Group`.
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        GroupRegistry {
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, group: Arc<Group>) {
        self.groups.write().insert(group.name().to_string(), group);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }

    /// Per-group metrics snapshots, for logging or a future metrics
    /// endpoint. Keyed by group name.
    pub fn metrics_snapshots(&self) -> HashMap<String, GroupMetricsSnapshot> {
        self.groups
            .read()
            .iter()
            .map(|(name, group)| (name.clone(), group.metrics_snapshot()))
            .collect()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroupError;
    use crate::group::GroupConfig;
    use crate::roles::{FnLoader, NoPeers};

    #[test]
    fn register_and_lookup_by_name() {
        let registry = GroupRegistry::new();
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let group = Arc::new(Group::new(
            "photos",
            loader,
            Arc::new(NoPeers),
            GroupConfig::default(),
        ));
        registry.register(Arc::clone(&group));

        assert!(registry.get("photos").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["photos".to_string()]);
    }
}
