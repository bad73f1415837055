use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::SocketAddr;

use crate::replica_key::ReplicaKey;

/// Advertised listener addresses for a voter, keyed by listener name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints(pub BTreeMap<String, SocketAddr>);

impl Endpoints {
    pub fn new(addrs: BTreeMap<String, SocketAddr>) -> Self {
        Self(addrs)
    }
}

/// A voter's identity and advertised endpoints, as supplied by the
/// membership module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterNode {
    pub voter_key: ReplicaKey,
    pub endpoints: Endpoints,
}

/// The set of voters effective at some point in the log, as supplied by the
/// membership module. Keyed by id: within one `VoterSet`, ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterSet {
    nodes: BTreeMap<i64, VoterNode>,
}

impl VoterSet {
    pub fn insert(&mut self, node: VoterNode) {
        self.nodes.insert(node.voter_key.id, node);
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &VoterNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    pub fn ids(&self) -> BTreeSet<i64> {
        self.nodes.keys().copied().collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&VoterNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// KRaft membership-protocol version. Version 0 predates dynamic
/// reconfiguration; versions >= 1 support it.
///
/// Resolves the Open Question implicit in `spec.md` §4.5's "does not support
/// reconfiguration" clause: that clause is checked against this threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KRaftVersion(pub u16);

impl KRaftVersion {
    pub const ZERO: KRaftVersion = KRaftVersion(0);

    pub fn supports_reconfiguration(&self) -> bool {
        self.0 >= 1
    }
}
