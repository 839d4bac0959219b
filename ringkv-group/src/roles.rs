//! The three collaborator roles a `Group` composes: a `Loader` that
//! produces a value for a key that is not cached anywhere, a `PeerPicker`
//! that decides which node owns a key, and a `PeerGetter` that fetches (or
//! deletes) a key from a specific remote node. Concrete implementations of
//! `PeerPicker`/`PeerGetter` live in `ringkv-transport` and
//! `ringkv-membership`; this crate only depends on the trait.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use ringkv_common::ByteView;

use crate::error::GroupError;

/// Produces a value for a key that missed every cache tier and every peer.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> Result<ByteView, GroupError>;
}

/// Adapts a plain async closure into a `Loader`, for wiring groups up
/// without a dedicated type.
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F> {
    pub fn new(f: F) -> Self {
        FnLoader { f }
    }
}

#[async_trait]
impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ByteView, GroupError>> + Send,
{
    async fn load(&self, key: &str) -> Result<ByteView, GroupError> {
        (self.f)(key.to_string()).await
    }
}

/// Fetches (or removes) a key from one specific remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<ByteView, GroupError>;
    async fn remove(&self, group: &str, key: &str) -> Result<bool, GroupError>;
}

/// Decides which node owns a key. Returns `None` when the local node owns
/// it, signalling the caller to run its own loader instead of making a
/// network call to itself.
pub trait PeerPicker: Send + Sync {
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// A picker that never has peers — every key is local. Useful for
/// single-node setups and tests.
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}
