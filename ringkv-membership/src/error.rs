use ringkv_group::GroupError;
use thiserror::Error;

/// Failures talking to the coordination store or decoding what it hands
/// back. Everything here collapses into `GroupError::Coordination` at the
/// boundary with the rest of the system.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("coordination store error: {0}")]
    Store(#[from] etcd_client::Error),
    #[error("malformed node record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("lease keepalive stream closed unexpectedly")]
    LeaseLost,
}

impl From<MembershipError> for GroupError {
    fn from(err: MembershipError) -> Self {
        GroupError::Coordination(err.to_string())
    }
}
