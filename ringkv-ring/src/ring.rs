//! Weighted consistent hash ring.
//!
//! A full-rebuild ring: node membership is kept as a flat `name -> weight`
//! map, and every mutation recomputes the `token -> node` `BTreeMap` from
//! scratch. That trades O(v) incremental updates for a simpler, always-
//! consistent-with-its-own-membership-map structure, which matters more
//! here than raw mutation throughput since membership changes are rare
//! compared to lookups.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;

/// Default virtual nodes contributed per unit of weight.
pub const DEFAULT_REPLICAS: usize = 50;

pub type HashFn = fn(&[u8]) -> u32;

fn crc32_hash(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("key must not be empty")]
    EmptyKey,
    #[error("ring has no nodes")]
    EmptyRing,
}

struct Inner {
    /// name -> weight; the source of truth for membership.
    nodes: BTreeMap<String, u32>,
    /// token -> name, rebuilt in full whenever `nodes` changes.
    spots: BTreeMap<u32, String>,
}

impl Inner {
    fn rebuild(&mut self, replicas: usize, hash_fn: HashFn) {
        self.spots.clear();
        for (name, weight) in &self.nodes {
            let count = replicas.saturating_mul(*weight as usize);
            for i in 0..count {
                let spot_key = format!("{name}-{i}");
                let token = hash_fn(spot_key.as_bytes());
                self.spots.insert(token, name.clone());
            }
        }
    }
}

/// Thread-safe weighted consistent hash ring.
pub struct Ring {
    replicas: usize,
    hash_fn: HashFn,
    inner: RwLock<Inner>,
}

impl Ring {
    /// Creates a ring using the default replica count and CRC32-IEEE hash.
    pub fn new() -> Self {
        Self::with_replicas(DEFAULT_REPLICAS)
    }

    pub fn with_replicas(replicas: usize) -> Self {
        Self::with_replicas_and_hash(replicas, crc32_hash)
    }

    pub fn with_replicas_and_hash(replicas: usize, hash_fn: HashFn) -> Self {
        Ring {
            replicas,
            hash_fn,
            inner: RwLock::new(Inner {
                nodes: BTreeMap::new(),
                spots: BTreeMap::new(),
            }),
        }
    }

    /// Adds or updates a single node's weight and rebuilds the ring.
    pub fn add_node(&self, name: &str, weight: u32) {
        let mut inner = self.inner.write();
        inner.nodes.insert(name.to_string(), weight);
        inner.rebuild(self.replicas, self.hash_fn);
    }

    /// Adds or updates several nodes in one rebuild pass.
    pub fn add_nodes(&self, nodes: &[(String, u32)]) {
        let mut inner = self.inner.write();
        for (name, weight) in nodes {
            inner.nodes.insert(name.clone(), *weight);
        }
        inner.rebuild(self.replicas, self.hash_fn);
    }

    /// Removes a node and rebuilds the ring. No-op if the node is unknown.
    pub fn del_node(&self, name: &str) {
        let mut inner = self.inner.write();
        if inner.nodes.remove(name).is_some() {
            inner.rebuild(self.replicas, self.hash_fn);
        }
    }

    /// Returns the node owning `key`, or an error for an empty key or an
    /// empty ring.
    pub fn get_node(&self, key: &str) -> Result<String, RingError> {
        if key.is_empty() {
            return Err(RingError::EmptyKey);
        }
        let inner = self.inner.read();
        if inner.spots.is_empty() {
            return Err(RingError::EmptyRing);
        }
        let token = (self.hash_fn)(key.as_bytes());
        let name = inner
            .spots
            .range(token..)
            .next()
            .or_else(|| inner.spots.iter().next())
            .map(|(_, name)| name.clone())
            .expect("ring is non-empty");
        Ok(name)
    }

    /// Current set of node names.
    pub fn nodes(&self) -> Vec<String> {
        self.inner.read().nodes.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}
