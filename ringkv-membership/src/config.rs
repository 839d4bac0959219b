/// Everything a node needs to register itself and discover peers against
/// one coordination store.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub endpoints: Vec<String>,
    /// Key prefix under which every node in the cluster publishes itself,
    /// e.g. `"ringkv/nodes/"`. Registration keys are `"{prefix}{lease_id}"`.
    pub service_prefix: String,
    pub lease_ttl_secs: i64,
    pub node_name: String,
    pub node_addr: String,
    pub node_weight: u32,
    pub ring_replicas: usize,
}

impl MembershipConfig {
    pub fn registration_key(&self, lease_id: i64) -> String {
        format!("{}{}", self.service_prefix, lease_id)
    }
}
