//! TCP peer transport: a pooled blocking client implementing `PeerGetter`,
//! and an async server dispatching framed requests to a `GroupRegistry`.

mod client;
mod error;
mod pool;
mod server;

pub use client::PeerClient;
pub use error::TransportError;
pub use pool::{ConnectionPool, PoolConfig};
pub use server::serve;
