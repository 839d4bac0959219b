//! Peer discovery: seeds the ring and getter table from a prefixed `Get`,
//! then keeps both up to date by reacting to a prefixed `Watch` stream.
//! Implements `PeerPicker` directly, so a `Group` can be wired straight to
//! a `Discovery` without any adapter.

use std::collections::HashMap;
use std::sync::Arc;

use etcd_client::{Client, EventType, GetOptions, WatchOptions};
use parking_lot::RwLock;
use ringkv_common::wire::ServiceNode;
use ringkv_group::PeerGetter;
use ringkv_ring::Ring;
use ringkv_transport::PeerClient;

use crate::config::MembershipConfig;
use crate::error::MembershipError;

/// Tracks cluster membership and answers "who owns this key" for the local
/// node's `Group`s. The local node is itself kept in the ring (so ownership
/// is computed correctly) but never gets an entry in `getters`, since
/// `pick` already returns `None` for keys the local node owns.
pub struct Discovery {
    ring: Arc<Ring>,
    getters: RwLock<HashMap<String, Arc<dyn PeerGetter>>>,
    /// etcd key -> node name, so a `Delete` event (which carries no value)
    /// can still be resolved to the node it removes.
    key_to_name: RwLock<HashMap<String, String>>,
    local_name: String,
}

impl Discovery {
    /// Seeds membership from the current state of the coordination store
    /// and spawns a background task that keeps it current. `client` is
    /// consumed by the watch task.
    pub async fn start(
        mut client: Client,
        config: MembershipConfig,
    ) -> Result<Arc<Discovery>, MembershipError> {
        let discovery = Arc::new(Discovery {
            ring: Arc::new(Ring::with_replicas(config.ring_replicas)),
            getters: RwLock::new(HashMap::new()),
            key_to_name: RwLock::new(HashMap::new()),
            local_name: config.node_name.clone(),
        });

        let seed = client
            .get(
                config.service_prefix.clone(),
                Some(GetOptions::new().with_prefix()),
            )
            .await?;
        for kv in seed.kvs() {
            if let Ok(node) = serde_json::from_slice::<ServiceNode>(kv.value()) {
                discovery.upsert(kv.key_str().unwrap_or_default(), node);
            }
        }

        let watch_discovery = Arc::clone(&discovery);
        let prefix = config.service_prefix.clone();
        tokio::spawn(async move {
            if let Err(err) = watch_discovery.watch(client, prefix).await {
                tracing::error!(error = %err, "membership watch stream ended");
            }
        });

        Ok(discovery)
    }

    async fn watch(&self, mut client: Client, prefix: String) -> Result<(), MembershipError> {
        let (_watcher, mut stream) = client
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await?;
        while let Some(resp) = stream.message().await? {
            for event in resp.events() {
                let Some(kv) = event.kv() else { continue };
                let key = kv.key_str().unwrap_or_default().to_string();
                match event.event_type() {
                    EventType::Put => {
                        if let Ok(node) = serde_json::from_slice::<ServiceNode>(kv.value()) {
                            self.upsert(&key, node);
                        }
                    }
                    EventType::Delete => self.remove_by_key(&key),
                }
            }
        }
        Err(MembershipError::LeaseLost)
    }

    fn upsert(&self, key: &str, node: ServiceNode) {
        self.ring.add_node(&node.name, node.weight);
        if node.name != self.local_name {
            let getter: Arc<dyn PeerGetter> = Arc::new(PeerClient::new(node.addr.clone()));
            self.getters.write().insert(node.name.clone(), getter);
            tracing::info!(node = %node.name, addr = %node.addr, "peer joined");
        }
        self.key_to_name
            .write()
            .insert(key.to_string(), node.name);
    }

    fn remove_by_key(&self, key: &str) {
        if let Some(name) = self.key_to_name.write().remove(key) {
            self.ring.del_node(&name);
            self.getters.write().remove(&name);
            tracing::info!(node = %name, "peer left");
        }
    }

    /// The ring backing this discovery, shared so a node can log or expose
    /// its current member list without going through `PeerPicker`.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }
}

impl ringkv_group::PeerPicker for Discovery {
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let owner = self.ring.get_node(key).ok()?;
        if owner == self.local_name {
            return None;
        }
        self.getters.read().get(&owner).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exercises the upsert/remove bookkeeping directly, without a live
    /// etcd connection — `start`'s network calls aren't reachable in a unit
    /// test, but the membership table logic they drive is plain code.
    fn bare(local_name: &str) -> Discovery {
        Discovery {
            ring: Arc::new(Ring::with_replicas(10)),
            getters: RwLock::new(HashMap::new()),
            key_to_name: RwLock::new(HashMap::new()),
            local_name: local_name.to_string(),
        }
    }

    #[test]
    fn local_node_is_placed_in_the_ring_without_a_getter() {
        let discovery = bare("n1");
        discovery.upsert(
            "prefix-1",
            ServiceNode {
                name: "n1".into(),
                addr: "127.0.0.1:1".into(),
                weight: 1,
            },
        );
        assert!(discovery.getters.read().is_empty());
        assert_eq!(discovery.ring.nodes(), vec!["n1".to_string()]);
    }

    #[test]
    fn remote_node_gets_a_getter_and_a_ring_slot() {
        let discovery = bare("n1");
        discovery.upsert(
            "prefix-2",
            ServiceNode {
                name: "n2".into(),
                addr: "127.0.0.1:2".into(),
                weight: 1,
            },
        );
        assert!(discovery.getters.read().contains_key("n2"));
        assert_eq!(discovery.ring.nodes(), vec!["n2".to_string()]);
    }

    #[test]
    fn delete_by_key_removes_the_right_node() {
        let discovery = bare("n1");
        discovery.upsert(
            "prefix-2",
            ServiceNode {
                name: "n2".into(),
                addr: "127.0.0.1:2".into(),
                weight: 1,
            },
        );
        discovery.remove_by_key("prefix-2");
        assert!(discovery.getters.read().is_empty());
        assert!(discovery.ring.nodes().is_empty());
    }

    #[test]
    fn pick_returns_none_for_keys_the_local_node_owns() {
        let discovery = bare("n1");
        discovery.upsert(
            "prefix-1",
            ServiceNode {
                name: "n1".into(),
                addr: "127.0.0.1:1".into(),
                weight: 1,
            },
        );
        assert!(ringkv_group::PeerPicker::pick(&discovery, "any-key").is_none());
    }

    #[test]
    fn pick_returns_a_getter_for_keys_a_peer_owns() {
        let discovery = bare("n1");
        discovery.upsert(
            "prefix-2",
            ServiceNode {
                name: "n2".into(),
                addr: "127.0.0.1:2".into(),
                weight: 1,
            },
        );
        assert!(ringkv_group::PeerPicker::pick(&discovery, "any-key").is_some());
    }
}
