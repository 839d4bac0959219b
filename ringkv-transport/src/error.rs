use ringkv_common::wire::WireError;
use ringkv_group::GroupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wire framing error: {0}")]
    Wire(#[from] WireError),
    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("invalid peer address")]
    InvalidAddress,
    #[error("peer returned an error: {0}")]
    Server(String),
    #[error("unexpected response frame")]
    UnexpectedResponse,
    #[error("key not found on peer")]
    NotFound,
}

/// `NotFound` is the only transport outcome that is not itself a transport
/// failure — it means the call succeeded and the peer's loader had nothing.
/// Everything else collapses to `GroupError::Transport` so callers can tell
/// "no peer had it" apart from "a peer was unreachable".
impl From<TransportError> for GroupError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound => GroupError::NotFound("not found on peer".to_string()),
            TransportError::Server(msg) => GroupError::Transport(msg),
            other => GroupError::Transport(other.to_string()),
        }
    }
}
