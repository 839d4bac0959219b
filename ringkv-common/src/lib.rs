//! Shared types for RingKV: the immutable byte view cached values are held
//! in, the cross-cutting error taxonomy, and the peer/client wire format.

mod byteview;
mod error;
pub mod wire;

pub use byteview::ByteView;
pub use error::{RingKvError, RingKvResult};
