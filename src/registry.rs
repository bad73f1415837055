use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::InvalidArgument;
use crate::membership::VoterSet;
use crate::replica_key::ReplicaKey;
use crate::replica_state::ReplicaState;

/// Holds per-replica state for the current voter set (keyed by id) and for
/// observers (keyed by the full [`ReplicaKey`], since observers may
/// legitimately share an id across different directory ids, e.g. a replica
/// that was reformatted).
#[derive(Debug, Default)]
pub(crate) struct ReplicaRegistry {
    voters: BTreeMap<i64, ReplicaState>,
    observers: HashMap<ReplicaKey, ReplicaState>,
}

/// Whether a registry lookup resolved to a voter slot or an observer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Voter,
    Observer,
}

impl ReplicaRegistry {
    pub(crate) fn voters(&self) -> &BTreeMap<i64, ReplicaState> {
        &self.voters
    }

    pub(crate) fn voters_mut(&mut self) -> &mut BTreeMap<i64, ReplicaState> {
        &mut self.voters
    }

    pub(crate) fn observers(&self) -> &HashMap<ReplicaKey, ReplicaState> {
        &self.observers
    }

    pub(crate) fn observers_mut(&mut self) -> &mut HashMap<ReplicaKey, ReplicaState> {
        &mut self.observers
    }

    pub(crate) fn is_voter_id(&self, id: i64) -> bool {
        self.voters.contains_key(&id)
    }

    /// Read-only lookup: voters first, then observers.
    pub(crate) fn get(&self, key: &ReplicaKey) -> Option<&ReplicaState> {
        if let Some(state) = self.voters.get(&key.id) {
            if state.replica_key.matches(key) {
                return Some(state);
            }
        }
        self.observers.get(key)
    }

    /// Returns the voter slot if `key.id` is a current voter and its stored
    /// key matches `key`; otherwise returns (creating if necessary) the
    /// observer slot for the full key.
    pub(crate) fn get_or_create(&mut self, key: ReplicaKey) -> (&mut ReplicaState, Slot) {
        let is_matching_voter = self.voters.get(&key.id).map(|s| s.replica_key.matches(&key)).unwrap_or(false);

        if is_matching_voter {
            (self.voters.get_mut(&key.id).unwrap(), Slot::Voter)
        } else {
            let state = self.observers.entry(key).or_insert_with(|| ReplicaState::new(key));
            (state, Slot::Observer)
        }
    }

    /// Rebuilds the voter map from `new_voters`, reusing prior state (from
    /// either map) for any replica that matches, and demoting voters that
    /// fell out of the set to observers (without clobbering an existing
    /// observer entry for that key). See `spec.md` §4.1.
    pub(crate) fn update_voter_and_observer_states(&mut self, new_voters: &VoterSet) -> Result<(), InvalidArgument> {
        let mut next_voters = BTreeMap::new();

        for (id, node) in new_voters.iter() {
            let new_key = node.voter_key;

            let mut reused = self.voters.remove(&id);
            if reused.is_none() {
                if let Some(obs_key) =
                    self.observers.keys().find(|k| k.matches_either_way(&new_key)).copied()
                {
                    reused = self.observers.remove(&obs_key);
                }
            }

            let mut state = reused.unwrap_or_else(|| {
                let mut s = ReplicaState::new(new_key);
                s.has_acknowledged_leader = false;
                s
            });
            // Only refine, never downgrade: if the stored key already carries a
            // directory id and `new_key` doesn't repeat it, keep the stored key as
            // the more specific identity rather than rejecting the reconfiguration.
            if new_key.directory_id.is_some() || state.replica_key.directory_id.is_none() {
                state.set_replica_key(new_key)?;
            }
            next_voters.insert(id, state);
        }

        // Anything still in `self.voters` fell out of the new set: demote to
        // observer, but never overwrite an existing observer entry.
        for (_, state) in self.voters.drain() {
            self.observers.entry(state.replica_key).or_insert(state);
        }

        self.voters = next_voters;
        Ok(())
    }
}
