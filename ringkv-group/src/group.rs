use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use ringkv_common::ByteView;
use ringkv_singleflight::SingleFlight;
use ringkv_store::{Store, Strategy};

use crate::error::GroupError;
use crate::metrics::{GroupMetrics, GroupMetricsSnapshot};
use crate::roles::{Loader, PeerPicker};

/// Per-group tunables. Recommended defaults mirror the values `spec.md`
/// names: a 1/10 chance of hot-cache admission for peer-sourced values, and
/// a 30 second default TTL for freshly loaded values.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub strategy: Strategy,
    pub main_cache_max_bytes: usize,
    pub hot_cache_enabled: bool,
    pub hot_cache_probability: f64,
    pub default_ttl: Option<Duration>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            strategy: Strategy::Lru,
            main_cache_max_bytes: 64 * 1024 * 1024,
            hot_cache_enabled: true,
            hot_cache_probability: 0.1,
            default_ttl: Some(Duration::from_secs(30)),
        }
    }
}

/// A named cache backed by a loader, a two-tier local cache, and (when
/// peers are configured) a consistent-hash-driven remote fetch path.
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    picker: Arc<dyn PeerPicker>,
    main_cache: Store,
    hot_cache: Option<Store>,
    flight: SingleFlight<(ByteView, bool), GroupError>,
    config: GroupConfig,
    metrics: Arc<GroupMetrics>,
}

impl Group {
    pub fn new(
        name: impl Into<String>,
        loader: Arc<dyn Loader>,
        picker: Arc<dyn PeerPicker>,
        config: GroupConfig,
    ) -> Self {
        Self::with_evict_callback(name, loader, picker, config, None)
    }

    /// Like `new`, but fires `on_evict` whenever the main cache evicts an
    /// entry to stay within `main_cache_max_bytes` (never on explicit
    /// `remove`, and never for the hot cache, which is a probabilistic
    /// second tier rather than the group's capacity contract).
    pub fn with_evict_callback(
        name: impl Into<String>,
        loader: Arc<dyn Loader>,
        picker: Arc<dyn PeerPicker>,
        config: GroupConfig,
        on_evict: Option<ringkv_store::EvictCallback>,
    ) -> Self {
        let hot_cache = if config.hot_cache_enabled {
            Some(Store::new(config.strategy, (config.main_cache_max_bytes / 8).max(1)))
        } else {
            None
        };
        let metrics = Arc::new(GroupMetrics::new());
        let metrics_for_evict = Arc::clone(&metrics);
        let main_cache = Store::with_evict_callback(
            config.strategy,
            config.main_cache_max_bytes,
            Box::new(move |key, value| {
                metrics_for_evict.record_eviction();
                if let Some(cb) = on_evict.as_ref() {
                    cb(key, value);
                }
            }),
        );
        Group {
            name: name.into(),
            loader,
            picker,
            main_cache,
            hot_cache,
            flight: SingleFlight::new(),
            config,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Point-in-time snapshot of this group's cache hit/miss, eviction,
    /// loader, peer-call, and singleflight-coalesce counters.
    pub fn metrics_snapshot(&self) -> GroupMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns a cached value, or loads one via the peer path / local
    /// loader, coalescing concurrent misses for the same key.
    pub async fn get(&self, key: &str) -> Result<ByteView, GroupError> {
        if key.is_empty() {
            return Err(GroupError::Internal("key must not be empty".into()));
        }

        if let Some(value) = self.main_cache.get(key) {
            self.metrics.record_main_hit();
            return Ok(value);
        }
        if let Some(hot) = &self.hot_cache {
            if let Some(value) = hot.get(key) {
                self.metrics.record_hot_hit();
                return Ok(value);
            }
        }
        self.metrics.record_miss();

        self.load(key).await
    }

    /// Inserts a value directly into the main cache, bypassing the loader
    /// and the peer path. Local only — it does not propagate to peers.
    /// `ttl` overrides the group's default TTL when provided.
    pub fn set(&self, key: &str, value: ByteView, ttl: Option<Duration>) {
        self.main_cache
            .set_with_ttl(key, value, ttl.or(self.config.default_ttl));
    }

    /// Removes a key. Deletes locally if present in either cache tier;
    /// otherwise forwards the removal to the owning peer.
    pub async fn remove(&self, key: &str) -> Result<bool, GroupError> {
        let removed_main = self.main_cache.delete(key).is_some();
        let removed_hot = self
            .hot_cache
            .as_ref()
            .map(|hot| hot.delete(key).is_some())
            .unwrap_or(false);
        if removed_main || removed_hot {
            return Ok(true);
        }

        match self.picker.pick(key) {
            Some(peer) => peer.remove(&self.name, key).await,
            None => Ok(false),
        }
    }

    async fn load(&self, key: &str) -> Result<ByteView, GroupError> {
        let picker = Arc::clone(&self.picker);
        let loader = Arc::clone(&self.loader);
        let metrics = Arc::clone(&self.metrics);
        let group_name = self.name.clone();
        let key_owned = key.to_string();

        let (result, is_leader) = self
            .flight
            .do_call_leading(key, move || async move {
                if let Some(peer) = picker.pick(&key_owned) {
                    let started = Instant::now();
                    let outcome = peer.get(&group_name, &key_owned).await;
                    metrics.record_peer_call(started.elapsed(), outcome.is_err());
                    return outcome.map(|value| (value, true));
                }
                metrics.record_loader_invocation();
                match loader.load(&key_owned).await {
                    Ok(value) => Ok((value, false)),
                    Err(err) => {
                        metrics.record_loader_error();
                        Err(err)
                    }
                }
            })
            .await;
        if !is_leader {
            self.metrics.record_coalesced();
        }
        let (value, from_peer) = result?;

        if from_peer {
            if let Some(hot) = &self.hot_cache {
                let admit = rand::thread_rng().gen_bool(self.config.hot_cache_probability);
                if admit {
                    hot.set_with_ttl(key, value.clone(), self.config.default_ttl);
                }
            }
        } else {
            self.main_cache
                .set_with_ttl(key, value.clone(), self.config.default_ttl);
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{FnLoader, NoPeers, PeerGetter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn bv(s: &str) -> ByteView {
        ByteView::copy_from(s.as_bytes())
    }

    #[tokio::test]
    async fn cache_hit_never_calls_the_loader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let loader = Arc::new(FnLoader::new(move |_key: String| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(bv("loaded"))
            }
        }));
        let group = Group::new("g", loader, Arc::new(NoPeers), GroupConfig::default());
        group.set("k", bv("cached"), None);

        let v = group.get("k").await.unwrap();
        assert_eq!(v.as_bytes(), b"cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_miss_invokes_loader_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let loader = Arc::new(FnLoader::new(move |_key: String| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(bv("v"))
            }
        }));
        let group = Arc::new(Group::new(
            "g",
            loader,
            Arc::new(NoPeers),
            GroupConfig::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let group = Arc::clone(&group);
            handles.push(tokio::spawn(async move { group.get("k").await }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap().as_bytes(), b"v");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_never_negatively_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let loader = Arc::new(FnLoader::new(move |key: String| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GroupError::NotFound(key))
            }
        }));
        let group = Group::new("g", loader, Arc::new(NoPeers), GroupConfig::default());

        assert!(group.get("missing").await.is_err());
        assert!(group.get("missing").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct StubPeer {
        value: ByteView,
    }

    #[async_trait::async_trait]
    impl PeerGetter for StubPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<ByteView, GroupError> {
            Ok(self.value.clone())
        }
        async fn remove(&self, _group: &str, _key: &str) -> Result<bool, GroupError> {
            Ok(true)
        }
    }

    struct AlwaysRemote(Arc<dyn PeerGetter>);

    impl PeerPicker for AlwaysRemote {
        fn pick(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(Arc::clone(&self.0))
        }
    }

    #[tokio::test]
    async fn remote_fetch_never_populates_main_cache_directly() {
        let peer = Arc::new(StubPeer { value: bv("remote") });
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let mut config = GroupConfig::default();
        config.hot_cache_probability = 0.0;
        let group = Group::new("g", loader, Arc::new(AlwaysRemote(peer)), config);

        let v = group.get("k").await.unwrap();
        assert_eq!(v.as_bytes(), b"remote");
        // Not admitted into the hot cache (probability 0) and never written
        // to the main cache since this node doesn't own the key.
        assert!(group.main_cache.len() == 0);
    }

    #[tokio::test]
    async fn remote_fetch_can_populate_hot_cache_probabilistically() {
        let peer = Arc::new(StubPeer { value: bv("remote") });
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let mut config = GroupConfig::default();
        config.hot_cache_probability = 1.0;
        let group = Group::new("g", loader, Arc::new(AlwaysRemote(peer)), config);

        let v = group.get("k").await.unwrap();
        assert_eq!(v.as_bytes(), b"remote");
        assert!(group.hot_cache.as_ref().unwrap().len() == 1);
    }

    #[tokio::test]
    async fn eviction_callback_fires_with_the_evicted_key_and_value() {
        let evicted = Arc::new(StdMutex::new(Vec::new()));
        let evicted2 = Arc::clone(&evicted);
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let mut config = GroupConfig::default();
        config.hot_cache_enabled = false;
        config.main_cache_max_bytes = 4;
        let group = Group::with_evict_callback(
            "g",
            loader,
            Arc::new(NoPeers),
            config,
            Some(Box::new(move |k, v| {
                evicted2.lock().unwrap().push((k.to_string(), v.to_vec()));
            })),
        );
        group.set("a", bv("1"), None); // weight 2
        group.set("b", bv("1"), None); // weight 2, total 4, fits
        group.set("c", bv("1"), None); // total would be 6 -> evicts "a"

        let log = evicted.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "a");
        assert_eq!(log[0].1, b"1");
    }

    #[tokio::test]
    async fn remove_does_not_fire_eviction_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let group = Group::with_evict_callback(
            "g",
            loader,
            Arc::new(NoPeers),
            GroupConfig::default(),
            Some(Box::new(move |_, _| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })),
        );
        group.set("a", bv("1"), None);
        assert!(group.remove("a").await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct FailingPeer;

    #[async_trait::async_trait]
    impl PeerGetter for FailingPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<ByteView, GroupError> {
            Err(GroupError::Transport("peer unreachable".into()))
        }
        async fn remove(&self, _group: &str, key: &str) -> Result<bool, GroupError> {
            Ok(key == "present-on-peer")
        }
    }

    #[tokio::test]
    async fn a_peer_fetch_error_propagates_instead_of_running_the_local_loader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let loader = Arc::new(FnLoader::new(move |_key: String| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(bv("should never be reached"))
            }
        }));
        let group = Group::new(
            "g",
            loader,
            Arc::new(AlwaysRemote(Arc::new(FailingPeer))),
            GroupConfig::default(),
        );

        let err = group.get("k").await.unwrap_err();
        assert!(matches!(err, GroupError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remove_forwards_to_the_owning_peer_when_not_cached_locally() {
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let group = Group::new(
            "g",
            loader,
            Arc::new(AlwaysRemote(Arc::new(FailingPeer))),
            GroupConfig::default(),
        );

        assert!(group.remove("present-on-peer").await.unwrap());
        assert!(!group.remove("absent-on-peer").await.unwrap());
    }

    #[tokio::test]
    async fn set_ttl_override_takes_precedence_over_the_group_default() {
        let loader = Arc::new(FnLoader::new(|key: String| async move {
            Err(GroupError::NotFound(key))
        }));
        let mut config = GroupConfig::default();
        config.default_ttl = Some(Duration::from_secs(30));
        let group = Group::new("g", loader, Arc::new(NoPeers), config);

        group.set("short-lived", bv("1"), Some(Duration::from_millis(1)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(group.get("short-lived").await.is_err());
    }

    #[tokio::test]
    async fn metrics_reflect_hits_misses_and_coalesced_calls() {
        let loader = Arc::new(FnLoader::new(|_key: String| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(bv("v"))
        }));
        let group = Arc::new(Group::new(
            "g",
            loader,
            Arc::new(NoPeers),
            GroupConfig::default(),
        ));
        group.set("cached", bv("c"), None);
        group.get("cached").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let group = Arc::clone(&group);
            handles.push(tokio::spawn(async move { group.get("miss").await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let snap = group.metrics_snapshot();
        assert_eq!(snap.main_hits, 1);
        // Each of the 5 concurrent callers misses both local tiers before
        // reaching the singleflight coalescing point.
        assert_eq!(snap.misses, 5);
        assert_eq!(snap.loader_invocations, 1);
        assert_eq!(snap.coalesced, 4);
    }
}
