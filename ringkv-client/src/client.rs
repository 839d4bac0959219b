//! Synchronous client API.
//!
//! A thin, blocking facade over `ringkv-transport`'s pooled connection and
//! binary frame codec — the same wire peers speak to each other, since an
//! operator client is just another caller of a node's transport server.

use std::time::Duration;

use bytes::Bytes;
use ringkv_common::wire::{DelRequest, Frame, GetRequest, SetRequest};
use ringkv_transport::{ConnectionPool, PoolConfig, TransportError};

pub type ClientResult<T> = Result<T, TransportError>;

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node address, e.g. "127.0.0.1:7000".
    pub addr: String,
    pub max_idle: usize,
    pub max_total: usize,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        let default = PoolConfig::new(addr);
        ClientConfig {
            addr: default.addr,
            max_idle: default.max_idle,
            max_total: default.max_total,
            connect_timeout: default.connect_timeout,
            read_timeout: default.read_timeout,
            write_timeout: default.write_timeout,
        }
    }
}

/// Blocking client for operators and tests: one TCP pool, one group-scoped
/// get/set/delete surface. Every call acquires a pooled connection, sends
/// one frame, and returns the connection when done.
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    pub fn connect(addr: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(addr))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let pool_config = PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };
        KVClient {
            pool: ConnectionPool::new(pool_config),
        }
    }

    /// Fetches a value by key from the named group. `Ok(None)` means the
    /// loader ran on the owning node and had nothing for this key.
    pub fn get(&self, group: &str, key: &str) -> ClientResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire()?;
        let reply = conn.exec(&Frame::Get(GetRequest {
            group: group.to_string(),
            key: key.to_string(),
        }))?;
        match reply {
            Frame::GetReply(resp) => Ok(resp.value.map(|v| v.to_vec())),
            Frame::Error(message) => Err(TransportError::Server(message)),
            _ => Err(TransportError::UnexpectedResponse),
        }
    }

    /// Sets a value directly in the named group's main cache, bypassing the
    /// loader. `ttl` overrides the group's default TTL when provided.
    pub fn set(&self, group: &str, key: &str, value: &[u8], ttl: Option<Duration>) -> ClientResult<()> {
        let mut conn = self.pool.acquire()?;
        let reply = conn.exec(&Frame::Set(SetRequest {
            group: group.to_string(),
            key: key.to_string(),
            value: Bytes::copy_from_slice(value),
            ttl_secs: ttl.map(|d| d.as_secs()),
        }))?;
        match reply {
            Frame::SetReply(_) => Ok(()),
            Frame::Error(message) => Err(TransportError::Server(message)),
            _ => Err(TransportError::UnexpectedResponse),
        }
    }

    /// Deletes a key from both local cache tiers. Returns whether it was
    /// present.
    pub fn delete(&self, group: &str, key: &str) -> ClientResult<bool> {
        let mut conn = self.pool.acquire()?;
        let reply = conn.exec(&Frame::Del(DelRequest {
            group: group.to_string(),
            key: key.to_string(),
        }))?;
        match reply {
            Frame::DelReply(resp) => Ok(resp.existed),
            Frame::Error(message) => Err(TransportError::Server(message)),
            _ => Err(TransportError::UnexpectedResponse),
        }
    }
}
