//! Bounded replacement store with pluggable LRU/LFU eviction.

mod store;

pub use store::{EvictCallback, Store, Strategy};
