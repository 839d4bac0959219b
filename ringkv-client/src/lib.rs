//! RingKV sync client.
//!
//! A lightweight, blocking client with connection pooling, for operators
//! and tests that want to talk to a node without pulling in `tokio`.

mod client;

pub use client::{ClientConfig, ClientResult, KVClient};
pub use ringkv_transport::TransportError as ClientError;
