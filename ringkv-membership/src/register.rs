//! Lease-based self-registration: grant a lease, publish this node's
//! identity under it, then keep the lease alive for as long as the process
//! runs. Modeled as a supervised task that restarts the whole grant/publish
//! cycle if the lease is ever lost (etcd restart, network partition), per
//! the retry-on-failure requirement for membership's background tasks.

use std::sync::Arc;
use std::time::Duration;

use etcd_client::{Client, PutOptions};
use ringkv_common::wire::ServiceNode;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::MembershipConfig;
use crate::error::MembershipError;

const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub struct Registration {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Registration {
    /// Spawns the background registration task. `client` is consumed; the
    /// task owns it for the lifetime of the registration.
    pub fn start(client: Client, config: MembershipConfig) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = Arc::clone(&shutdown);
        let task = tokio::spawn(run(client, config, task_shutdown));
        Registration { shutdown, task }
    }

    /// Revokes the lease and stops the background task.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.task.await;
    }
}

async fn run(mut client: Client, config: MembershipConfig, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => return,
            result = register_once(&mut client, &config, &shutdown) => {
                match result {
                    Ok(()) => return, // clean shutdown inside register_once
                    Err(err) => tracing::warn!(error = %err, "lease registration lost, retrying"),
                }
            }
        }
        tokio::select! {
            _ = shutdown.notified() => return,
            _ = tokio::time::sleep(RETRY_BACKOFF) => {}
        }
    }
}

async fn register_once(
    client: &mut Client,
    config: &MembershipConfig,
    shutdown: &Notify,
) -> Result<(), MembershipError> {
    let lease = client.lease_grant(config.lease_ttl_secs, None).await?;
    let lease_id = lease.id();

    let node = ServiceNode {
        name: config.node_name.clone(),
        addr: config.node_addr.clone(),
        weight: config.node_weight,
    };
    let value = serde_json::to_vec(&node)?;
    let key = config.registration_key(lease_id);
    client
        .put(key, value, Some(PutOptions::new().with_lease(lease_id)))
        .await?;
    tracing::info!(lease_id, node = %config.node_name, "registered with coordination store");

    let (mut keeper, mut stream) = client.lease_keep_alive(lease_id).await?;
    let half_ttl = Duration::from_secs((config.lease_ttl_secs / 2).max(1) as u64);

    loop {
        keeper.keep_alive().await?;
        tokio::select! {
            message = stream.message() => {
                match message? {
                    Some(resp) if resp.ttl() > 0 => {
                        tokio::time::sleep(half_ttl).await;
                    }
                    _ => return Err(MembershipError::LeaseLost),
                }
            }
            _ = shutdown.notified() => {
                let _ = client.lease_revoke(lease_id).await;
                return Ok(());
            }
        }
    }
}
