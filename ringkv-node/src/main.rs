//! Node entrypoint: parses configuration, registers with the coordination
//! store, starts peer discovery, and serves the peer transport until the
//! process is asked to shut down.

mod config;
mod metrics;

use std::sync::Arc;

use clap::Parser;
use ringkv_group::{FnLoader, Group, GroupConfig, GroupError, GroupRegistry};
use ringkv_membership::{Discovery, MembershipConfig, Registration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, GroupDef, NodeConfig};
use crate::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::load(cli)?;
    let metrics = Arc::new(Metrics::new());

    let etcd_client = etcd_client::Client::connect(config.coordination_endpoints.clone(), None).await?;

    let membership_config = MembershipConfig {
        endpoints: config.coordination_endpoints.clone(),
        service_prefix: config.service_prefix.clone(),
        lease_ttl_secs: config.lease_ttl_secs,
        node_name: config.node_name.clone(),
        node_addr: config.node_addr.clone(),
        node_weight: config.node_weight,
        ring_replicas: config.ring_replicas,
    };

    let discovery = Discovery::start(etcd_client.clone(), membership_config.clone()).await?;
    let registration = Registration::start(etcd_client, membership_config);

    let registry = Arc::new(GroupRegistry::new());
    for def in &config.groups {
        registry.register(Arc::new(build_group(def, Arc::clone(&discovery))));
    }
    tracing::info!(groups = ?registry.names(), "groups ready");

    let listener = TcpListener::bind(&config.node_addr).await?;
    tracing::info!(addr = %config.node_addr, node = %config.node_name, "peer transport listening");

    let serve_registry = Arc::clone(&registry);
    let serve_task = tokio::spawn(async move { ringkv_transport::serve(listener, serve_registry).await });

    tokio::select! {
        result = serve_task => {
            if let Err(err) = result {
                tracing::error!(error = %err, "peer transport task panicked");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    registration.shutdown().await;
    let snapshot = metrics.snapshot();
    tracing::info!(requests = snapshot.requests_total, errors = snapshot.errors_total, "final metrics");
    for (name, group_metrics) in registry.metrics_snapshots() {
        tracing::info!(
            group = %name,
            main_hits = group_metrics.main_hits,
            hot_hits = group_metrics.hot_hits,
            misses = group_metrics.misses,
            evictions = group_metrics.evictions,
            loader_invocations = group_metrics.loader_invocations,
            loader_errors = group_metrics.loader_errors,
            peer_calls = group_metrics.peer_calls,
            peer_errors = group_metrics.peer_errors,
            peer_latency_sum_us = group_metrics.peer_latency_sum_us,
            coalesced = group_metrics.coalesced,
            "final group metrics"
        );
    }

    Ok(())
}

/// Every group needs a loader; the business logic that produces values for
/// a cache miss is specific to each deployment and is not part of this
/// system, so uninstrumented groups fall back to a loader that always
/// reports a miss as not-found rather than silently fabricating data.
fn build_group(def: &GroupDef, picker: Arc<Discovery>) -> Group {
    let loader = Arc::new(FnLoader::new(|key: String| async move {
        Err::<ringkv_common::ByteView, GroupError>(GroupError::NotFound(key))
    }));
    let config = GroupConfig {
        strategy: def.strategy,
        main_cache_max_bytes: def.main_cache_max_bytes as usize,
        hot_cache_enabled: def.hot_cache_enabled,
        hot_cache_probability: def.hot_cache_probability,
        default_ttl: def.default_ttl_secs.map(std::time::Duration::from_secs),
    };
    Group::new(def.name.clone(), loader, picker, config)
}
