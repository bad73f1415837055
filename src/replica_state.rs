use std::cmp::Ordering;

use crate::error::InvalidArgument;
use crate::log_offset::cmp_end_offset;
use crate::log_offset::LogOffsetMetadata;
use crate::replica_key::ReplicaKey;

/// Per-replica bookkeeping held by the leader: how far this replica has
/// replicated, when it last fetched, and whether it has acknowledged the
/// current leader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaState {
    pub replica_key: ReplicaKey,
    pub end_offset: Option<LogOffsetMetadata>,
    pub last_fetch_timestamp: i64,
    pub last_fetch_leader_log_end_offset: i64,
    pub last_caught_up_timestamp: i64,
    pub has_acknowledged_leader: bool,
}

impl ReplicaState {
    pub fn new(replica_key: ReplicaKey) -> Self {
        Self {
            replica_key,
            end_offset: None,
            last_fetch_timestamp: -1,
            last_fetch_leader_log_end_offset: -1,
            last_caught_up_timestamp: -1,
            has_acknowledged_leader: false,
        }
    }

    /// Refine the stored key with a learned directory id, or confirm it
    /// matches exactly if one is already known. The id itself is immutable.
    ///
    /// See `spec.md` §4.6: a mismatched id, or a mismatched directory id
    /// when one is already stored, is a caller error.
    pub(crate) fn set_replica_key(&mut self, new_key: ReplicaKey) -> Result<(), InvalidArgument> {
        if new_key.id != self.replica_key.id {
            return Err(InvalidArgument::ReplicaKeyMismatch {
                stored: self.replica_key,
                requested: new_key,
            });
        }
        if let Some(stored_dir) = self.replica_key.directory_id {
            if new_key.directory_id != Some(stored_dir) {
                return Err(InvalidArgument::ReplicaKeyMismatch {
                    stored: self.replica_key,
                    requested: new_key,
                });
            }
        } else {
            self.replica_key = new_key;
        }
        Ok(())
    }
}

/// Orders replica states by `end_offset` descending (absent sorts last),
/// breaking ties by `replica_key` ascending for deterministic output. This
/// is the order the quorum tracker sorts voters by, and what
/// `non_leader_voters_by_descending_fetch_offset` returns.
pub(crate) fn cmp_replica_state_desc(a: &ReplicaState, b: &ReplicaState) -> Ordering {
    cmp_end_offset(&b.end_offset, &a.end_offset).then_with(|| a.replica_key.cmp(&b.replica_key))
}

/// Applies the leader's end-offset update directly: for the local replica,
/// the leader's own fetch position is simply its log end offset.
pub(crate) fn apply_local_update(state: &mut ReplicaState, end_offset: LogOffsetMetadata) {
    state.end_offset = Some(end_offset);
}

/// Applies a remote replica's fetch to its replica state, computing the
/// caught-up timestamps per `spec.md` §4.4.
///
/// `leader_end_offset` is the leader's end offset *as of this fetch*;
/// `fetch_offset` is the position the replica is now fetching from.
pub(crate) fn apply_follower_fetch(
    state: &mut ReplicaState,
    now: i64,
    leader_end_offset: i64,
    fetch_offset: LogOffsetMetadata,
) {
    let f_now = fetch_offset.offset as i64;
    let f_prev = state.last_fetch_leader_log_end_offset;

    if f_now >= leader_end_offset {
        state.last_caught_up_timestamp = state.last_caught_up_timestamp.max(now);
    } else if f_prev > 0 && f_now >= f_prev {
        state.last_caught_up_timestamp = state.last_caught_up_timestamp.max(state.last_fetch_timestamp);
    }

    state.last_fetch_leader_log_end_offset = leader_end_offset;
    state.last_fetch_timestamp = state.last_fetch_timestamp.max(now);
    state.end_offset = Some(fetch_offset);
    state.has_acknowledged_leader = true;
}
