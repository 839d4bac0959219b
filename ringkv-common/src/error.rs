//! Shared error taxonomy.
//!
//! Every fallible surface in RingKV ultimately reports one of these kinds.
//! Crate-local error types (e.g. `ringkv_transport::TransportError`) convert
//! into this taxonomy at their public boundary rather than leaking their own
//! internal variants upward.

use thiserror::Error;

/// The cross-cutting error taxonomy from the cache's external interface.
#[derive(Debug, Error)]
pub enum RingKvError {
    /// The loader (local or remote) completed without producing a value.
    /// Never cached negatively; callers see this on every retry until the
    /// loader succeeds.
    #[error("key not found: {0}")]
    NotFound(String),

    /// A peer RPC failed at the network layer (connect/read/write/framing).
    #[error("transport error: {0}")]
    Transport(String),

    /// The coordination store (lease/watch backend) returned an error or
    /// the connection to it was lost.
    #[error("coordination error: {0}")]
    Coordination(String),

    /// Reserved for future capacity-rejection semantics. The replacement
    /// store never returns this today (`spec.md` guarantees `Set` cannot
    /// fail due to capacity), so this variant is currently unreachable from
    /// any API in the workspace.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// An operation did not complete before its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Anything else: a bug, an invariant violation, a poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type RingKvResult<T> = Result<T, RingKvError>;
