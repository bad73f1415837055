/// One replica's entry in a [`QuorumInfo`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDescription {
    pub replica_id: i64,
    /// The replicated log-end offset, or `-1` if unknown.
    pub log_end_offset: i64,
    pub last_caught_up_timestamp: i64,
    pub last_fetch_timestamp: i64,
}

/// External, read-only snapshot of the leader's quorum state, as returned by
/// `describe_quorum`. `error` mirrors the wire schema's error field, which
/// this module never populates (errors in producing the snapshot don't
/// exist at this layer) but is kept for shape compatibility with the
/// `DescribeQuorum` RPC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumInfo {
    pub error: Option<String>,
    pub leader_id: i64,
    pub epoch: i32,
    /// The high watermark, or `-1` if unset.
    pub high_watermark: i64,
    pub current_voters: Vec<ReplicaDescription>,
    pub observers: Vec<ReplicaDescription>,
}
