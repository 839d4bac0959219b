//! Weighted consistent hash ring used to assign keys to cluster nodes.

mod ring;

pub use ring::{HashFn, Ring, RingError, DEFAULT_REPLICAS};
