use ringkv_common::RingKvError;
use thiserror::Error;

/// Error taxonomy surfaced by `Group` operations — the concrete instance of
/// the cross-cutting NotFound/Transport/Coordination/Timeout/Internal
/// classification for this crate's operations.
#[derive(Debug, Error, Clone)]
pub enum GroupError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("coordination error: {0}")]
    Coordination(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GroupError> for RingKvError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::NotFound(m) => RingKvError::NotFound(m),
            GroupError::Transport(m) => RingKvError::Transport(m),
            GroupError::Coordination(m) => RingKvError::Coordination(m),
            GroupError::Timeout(m) => RingKvError::Timeout(m),
            GroupError::Internal(m) => RingKvError::Internal(m),
        }
    }
}

impl From<ringkv_ring::RingError> for GroupError {
    fn from(err: ringkv_ring::RingError) -> Self {
        GroupError::Internal(err.to_string())
    }
}

impl From<ringkv_singleflight::FlightError<GroupError>> for GroupError {
    fn from(err: ringkv_singleflight::FlightError<GroupError>) -> Self {
        match err {
            ringkv_singleflight::FlightError::Inner(e) => e,
            ringkv_singleflight::FlightError::Panicked(msg) => GroupError::Internal(msg),
        }
    }
}
