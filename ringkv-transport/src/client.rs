//! Peer client: the concrete `PeerGetter` used when a consistent-hash
//! lookup names a remote node.

use async_trait::async_trait;
use ringkv_common::wire::{DelRequest, Frame, GetRequest};
use ringkv_common::ByteView;
use ringkv_group::{GroupError, PeerGetter};

use crate::error::TransportError;
use crate::pool::{ConnectionPool, PoolConfig};

pub struct PeerClient {
    pool: ConnectionPool,
}

impl PeerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_config(PoolConfig::new(addr))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        PeerClient {
            pool: ConnectionPool::new(config),
        }
    }
}

#[async_trait]
impl PeerGetter for PeerClient {
    async fn get(&self, group: &str, key: &str) -> Result<ByteView, GroupError> {
        let pool = self.pool.clone();
        let group = group.to_string();
        let key = key.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut conn = pool.acquire()?;
            let reply = conn.exec(&Frame::Get(GetRequest { group, key }))?;
            match reply {
                Frame::GetReply(resp) => match resp.value {
                    Some(bytes) => Ok(ByteView::from_bytes(bytes)),
                    None => Err(TransportError::NotFound),
                },
                Frame::Error(msg) => Err(TransportError::Server(msg)),
                _ => Err(TransportError::UnexpectedResponse),
            }
        })
        .await
        .map_err(|join_err| GroupError::Internal(join_err.to_string()))?;
        outcome.map_err(GroupError::from)
    }

    async fn remove(&self, group: &str, key: &str) -> Result<bool, GroupError> {
        let pool = self.pool.clone();
        let group = group.to_string();
        let key = key.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut conn = pool.acquire()?;
            let reply = conn.exec(&Frame::Del(DelRequest { group, key }))?;
            match reply {
                Frame::DelReply(resp) => Ok(resp.existed),
                Frame::Error(msg) => Err(TransportError::Server(msg)),
                _ => Err(TransportError::UnexpectedResponse),
            }
        })
        .await
        .map_err(|join_err| GroupError::Internal(join_err.to_string()))?;
        outcome.map_err(GroupError::from)
    }
}
