use std::fmt;

use uuid::Uuid;

/// Identity of a replica: a node id plus an optional storage-instance id.
///
/// Ids are signed so that non-replica readers (e.g. a plain consumer probing
/// the log) can be represented with a negative id and uniformly ignored by
/// every state-mutating operation, per [`ReplicaKey::is_replica`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ReplicaKey {
    pub id: i64,
    pub directory_id: Option<Uuid>,
}

impl ReplicaKey {
    pub fn new(id: i64, directory_id: Option<Uuid>) -> Self {
        Self { id, directory_id }
    }

    /// A key with no directory refinement yet.
    pub fn bare(id: i64) -> Self {
        Self { id, directory_id: None }
    }

    /// Negative ids denote non-replica readers and must be ignored by every
    /// state update.
    pub fn is_replica(&self) -> bool {
        self.id >= 0
    }

    /// `self` is the *stored* key, `other` is the key presented by an
    /// incoming request. They match when the ids are equal and either
    /// `self` carries no directory id (not yet refined) or both carry the
    /// same directory id.
    pub fn matches(&self, other: &ReplicaKey) -> bool {
        if self.id != other.id {
            return false;
        }
        match (self.directory_id, other.directory_id) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        }
    }

    /// Symmetric version of [`Self::matches`]: true if either key, taken as
    /// the "stored" side, matches the other. Used when reconciling a
    /// previously-unrefined key against a freshly-refined one, or vice
    /// versa.
    pub fn matches_either_way(&self, other: &ReplicaKey) -> bool {
        self.matches(other) || other.matches(self)
    }
}

impl fmt::Display for ReplicaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.directory_id {
            Some(dir) => write!(f, "{}:{}", self.id, dir),
            None => write!(f, "{}", self.id),
        }
    }
}
