use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use crate::accumulator::BatchAccumulator;
use crate::accumulator::ControlRecord;
use crate::accumulator::FromControlRecord;
use crate::accumulator::LEADER_CHANGE_MESSAGE_CURRENT_VERSION;
use crate::describe::QuorumInfo;
use crate::describe::ReplicaDescription;
use crate::error::InvalidArgument;
use crate::error::InvalidState;
use crate::error::LeaderStateError;
use crate::log_offset::LogOffsetMetadata;
use crate::membership::Endpoints;
use crate::membership::KRaftVersion;
use crate::membership::VoterNode;
use crate::membership::VoterSet;
use crate::registry::ReplicaRegistry;
use crate::registry::Slot;
use crate::replica_key::ReplicaKey;
use crate::replica_state::apply_follower_fetch;
use crate::replica_state::apply_local_update;
use crate::replica_state::cmp_replica_state_desc;
use crate::replica_state::ReplicaState;
use crate::timers::check_quorum_timeout_ms;
use crate::timers::BeginQuorumTimer;
use crate::timers::CheckQuorumTimer;
use crate::timers::OBSERVER_SESSION_TIMEOUT_MS;

/// Sentinel offset for `offset_of_voters_at_epoch_start`: the voter set at
/// epoch start came from a bootstrap checkpoint rather than from the log.
pub const BOOTSTRAP_CHECKPOINT_OFFSET: i64 = -1;

/// `election()`'s return value: the identity of the current leadership term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderAndEpoch {
    pub leader_id: i64,
    pub epoch: i32,
}

/// The per-epoch in-memory record of a Raft leader's view of its followers:
/// who they are, how far each has replicated, and when the leader must
/// step down for having lost contact with a majority.
///
/// Generic over the log-record type `R` (what the batch accumulator stores)
/// and the accumulator type `A` itself, so this crate never has to know how
/// records are serialized — only which control records to emit and when.
#[derive(Debug)]
pub struct LeaderState<R, A>
where
    A: BatchAccumulator<R>,
{
    // -- immutable for the epoch --
    local_replica_key: ReplicaKey,
    epoch: i32,
    epoch_start_offset: u64,
    granting_voters: BTreeSet<i64>,
    endpoints: Endpoints,
    voter_set_at_epoch_start: VoterSet,
    offset_of_voters_at_epoch_start: Option<i64>,
    kraft_version_at_epoch_start: KRaftVersion,
    fetch_timeout_ms: i64,

    // -- mutable --
    registry: ReplicaRegistry,
    high_watermark: Option<LogOffsetMetadata>,
    fetched_voters: BTreeSet<i64>,
    check_quorum_timer: CheckQuorumTimer,
    begin_quorum_timer: BeginQuorumTimer,
    resign_requested: Arc<AtomicBool>,

    accumulator: A,
    _record: PhantomData<R>,
}

impl<R, A> LeaderState<R, A>
where
    R: FromControlRecord,
    A: BatchAccumulator<R>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_replica_key: ReplicaKey,
        epoch: i32,
        epoch_start_offset: u64,
        granting_voters: BTreeSet<i64>,
        endpoints: Endpoints,
        voter_set_at_epoch_start: VoterSet,
        offset_of_voters_at_epoch_start: Option<i64>,
        kraft_version_at_epoch_start: KRaftVersion,
        fetch_timeout_ms: i64,
        accumulator: A,
        now: i64,
    ) -> Self {
        let mut registry = ReplicaRegistry::default();
        // Reconciling against an empty registry just populates the voter map.
        registry
            .update_voter_and_observer_states(&voter_set_at_epoch_start)
            .expect("epoch-start voter set always reconciles cleanly against an empty registry");

        let check_quorum_timer = CheckQuorumTimer::new(now, check_quorum_timeout_ms(fetch_timeout_ms));

        Self {
            local_replica_key,
            epoch,
            epoch_start_offset,
            granting_voters,
            endpoints,
            voter_set_at_epoch_start,
            offset_of_voters_at_epoch_start,
            kraft_version_at_epoch_start,
            fetch_timeout_ms,
            registry,
            high_watermark: None,
            fetched_voters: BTreeSet::new(),
            check_quorum_timer,
            begin_quorum_timer: BeginQuorumTimer::new_expired(),
            resign_requested: Arc::new(AtomicBool::new(false)),
            accumulator,
            _record: PhantomData,
        }
    }

    // ---- local / follower end-offset updates (spec.md §4.4) ----

    /// Updates the leader's own end offset and reconciles the voter set
    /// against `new_voter_set` (the latest membership seen in the local
    /// log). Returns whether the high watermark advanced.
    #[tracing::instrument(level = "debug", skip(self, new_voter_set))]
    pub fn update_local_state(
        &mut self,
        now: i64,
        end_offset_metadata: LogOffsetMetadata,
        new_voter_set: &VoterSet,
    ) -> Result<bool, LeaderStateError> {
        let local_key = self.local_replica_key;
        let (state, _slot) = self.registry.get_or_create(local_key);

        if let Some(stored) = &state.end_offset {
            if stored.offset > end_offset_metadata.offset {
                return Err(InvalidState::NonMonotonicLocalEndOffset {
                    stored: stored.offset,
                    proposed: end_offset_metadata.offset,
                }
                .into());
            }
        }

        apply_local_update(state, end_offset_metadata);
        tracing::debug!(now, "updated local end offset");

        self.registry.update_voter_and_observer_states(new_voter_set)?;
        self.fetched_voters.retain(|id| self.registry.is_voter_id(*id));

        Ok(self.maybe_advance_high_watermark())
    }

    /// Records a fetch from `replica_key`. Non-replica ids (`< 0`) are
    /// ignored. Fetches from the leader's own id are rejected. Returns
    /// whether the high watermark advanced (observer fetches never advance
    /// it).
    #[tracing::instrument(level = "debug", skip(self, fetch_offset_metadata))]
    pub fn update_replica_state(
        &mut self,
        replica_key: ReplicaKey,
        now: i64,
        fetch_offset_metadata: LogOffsetMetadata,
    ) -> Result<bool, LeaderStateError> {
        if !replica_key.is_replica() {
            return Ok(false);
        }
        if replica_key.id == self.local_replica_key.id {
            return Err(InvalidState::FetchFromLeaderId(replica_key.id).into());
        }

        let leader_end_offset = self
            .registry
            .get(&self.local_replica_key)
            .and_then(|s| s.end_offset.as_ref())
            .map(|eo| eo.offset as i64)
            .unwrap_or(0);

        let (state, slot) = self.registry.get_or_create(replica_key);

        if let Some(stored) = &state.end_offset {
            if stored.offset > fetch_offset_metadata.offset {
                tracing::warn!(
                    replica = %replica_key,
                    stored = stored.offset,
                    fetched = fetch_offset_metadata.offset,
                    "follower fetch offset regressed; proceeding"
                );
            }
        }

        apply_follower_fetch(state, now, leader_end_offset, fetch_offset_metadata);

        let is_voter = slot == Slot::Voter;
        if is_voter {
            self.record_voter_fetch(replica_key.id, now);
        }

        Ok(if is_voter { self.maybe_advance_high_watermark() } else { false })
    }

    fn record_voter_fetch(&mut self, id: i64, now: i64) {
        self.fetched_voters.insert(id);

        let n = self.registry.voters().len();
        if n <= 1 {
            return;
        }

        let majority = n / 2 + 1;
        let threshold = if self.registry.is_voter_id(self.local_replica_key.id) {
            majority.saturating_sub(1)
        } else {
            majority
        };

        if self.fetched_voters.len() >= threshold {
            self.fetched_voters.clear();
            self.check_quorum_timer.reset(now);
        }
    }

    // ---- quorum tracker (spec.md §4.2) ----

    fn maybe_advance_high_watermark(&mut self) -> bool {
        let voters = self.registry.voters();
        let n = voters.len();
        if n == 0 {
            return false;
        }

        let mut sorted: Vec<&ReplicaState> = voters.values().collect();
        sorted.sort_by(|a, b| cmp_replica_state_desc(a, b));

        let m = n / 2;
        let candidate = match &sorted[m].end_offset {
            Some(eo) => eo.clone(),
            None => return false,
        };

        if candidate.offset <= self.epoch_start_offset {
            return false;
        }

        match &self.high_watermark {
            None => {
                tracing::info!(offset = candidate.offset, "high watermark established");
                self.high_watermark = Some(candidate);
                true
            }
            Some(current) if candidate.offset > current.offset => {
                tracing::info!(from = current.offset, to = candidate.offset, "high watermark advanced");
                self.high_watermark = Some(candidate);
                true
            }
            Some(current) if candidate.offset == current.offset => {
                if candidate.metadata != current.metadata {
                    tracing::info!(offset = candidate.offset, "high watermark metadata updated at same offset");
                    self.high_watermark = Some(candidate);
                    true
                } else {
                    false
                }
            }
            Some(current) => {
                tracing::warn!(
                    current = current.offset,
                    candidate = candidate.offset,
                    "computed high watermark would retreat; ignoring"
                );
                false
            }
        }
    }

    // ---- liveness timers (spec.md §4.3) ----

    pub fn time_until_check_quorum_expires(&self, now: i64) -> i64 {
        if self.registry.voters().len() <= 1 {
            return i64::MAX;
        }
        self.check_quorum_timer.time_until_expires(now)
    }

    pub fn time_until_begin_quorum_epoch_timer_expires(&self, now: i64) -> i64 {
        self.begin_quorum_timer.time_until_expires(now)
    }

    pub fn reset_begin_quorum_epoch_timer(&mut self, now: i64) {
        self.begin_quorum_timer.reset(now, self.fetch_timeout_ms);
    }

    /// Voters that have not yet acknowledged the current leader (excluding
    /// the leader itself), the target set for the next `BeginQuorumEpoch`
    /// broadcast.
    pub fn non_acknowledging_voters(&self) -> Vec<ReplicaKey> {
        self.registry
            .voters()
            .values()
            .filter(|s| s.replica_key.id != self.local_replica_key.id && !s.has_acknowledged_leader)
            .map(|s| s.replica_key)
            .collect()
    }

    /// Voters other than the leader, ordered by descending fetch offset.
    /// Used by the caller to pick a preferred successor.
    pub fn non_leader_voters_by_descending_fetch_offset(&self) -> Vec<ReplicaState> {
        let mut v: Vec<ReplicaState> = self
            .registry
            .voters()
            .values()
            .filter(|s| s.replica_key.id != self.local_replica_key.id)
            .cloned()
            .collect();
        v.sort_by(cmp_replica_state_desc);
        v
    }

    /// Records that `id` has acknowledged the current leader, e.g. by
    /// responding to `BeginQuorumEpoch`.
    pub fn add_acknowledgement_from(&mut self, id: i64) -> Result<(), InvalidArgument> {
        match self.registry.voters_mut().get_mut(&id) {
            Some(state) => {
                state.has_acknowledged_leader = true;
                Ok(())
            }
            None => Err(InvalidArgument::AcknowledgementFromNonVoter(id)),
        }
    }

    // ---- accessors ----

    pub fn election(&self) -> LeaderAndEpoch {
        LeaderAndEpoch { leader_id: self.local_replica_key.id, epoch: self.epoch }
    }

    pub fn epoch(&self) -> i32 {
        self.epoch
    }

    pub fn epoch_start_offset(&self) -> u64 {
        self.epoch_start_offset
    }

    pub fn leader_endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn granting_voters(&self) -> &BTreeSet<i64> {
        &self.granting_voters
    }

    pub fn high_watermark(&self) -> Option<&LogOffsetMetadata> {
        self.high_watermark.as_ref()
    }

    /// The voter nodes (id + advertised endpoints) known as of epoch start.
    /// Live membership changes mid-epoch are tracked by the registry for
    /// quorum purposes, but this crate does not retain updated endpoints for
    /// them; that is the membership module's concern.
    pub fn nodes(&self, _now: i64) -> Vec<VoterNode> {
        self.voter_set_at_epoch_start.iter().map(|(_, n)| n.clone()).collect()
    }

    /// A leader never grants a vote within its own epoch.
    pub fn can_grant_vote(&self, _candidate: ReplicaKey, _candidate_log_up_to_date: bool) -> bool {
        false
    }

    // ---- leader-change bootstrap emission (spec.md §4.5) ----

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn append_leader_change_message_and_bootstrap_records(&mut self, now: i64) -> Result<(), LeaderStateError> {
        let leader_change = ControlRecord::LeaderChange {
            version: LEADER_CHANGE_MESSAGE_CURRENT_VERSION,
            leader_id: self.local_replica_key.id,
            voters: self.registry.voters().keys().copied().collect(),
            granting_voters: self.granting_voters.iter().copied().collect(),
        };
        let mut records = vec![R::from_control_record(leader_change)];

        if self.offset_of_voters_at_epoch_start == Some(BOOTSTRAP_CHECKPOINT_OFFSET) {
            if !self.kraft_version_at_epoch_start.supports_reconfiguration() {
                return Err(InvalidState::ReconfigurationNotSupported(self.kraft_version_at_epoch_start).into());
            }
            records.push(R::from_control_record(ControlRecord::KRaftVersion {
                version: self.kraft_version_at_epoch_start,
            }));
            records.push(R::from_control_record(ControlRecord::Voters {
                voter_set: self.voter_set_at_epoch_start.clone(),
            }));
        }

        self.accumulator.append_control_messages(now, records);
        self.accumulator.force_drain();
        Ok(())
    }

    // ---- describe-quorum (spec.md §4.7) ----

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn describe_quorum(&mut self, now: i64) -> QuorumInfo {
        self.gc_observers(now);

        let high_watermark = self.high_watermark.as_ref().map(|h| h.offset as i64).unwrap_or(-1);

        let current_voters = self.registry.voters().values().map(|s| self.describe_replica(s, now)).collect();
        let observers = self.registry.observers().values().map(|s| self.describe_replica(s, now)).collect();

        QuorumInfo {
            error: None,
            leader_id: self.local_replica_key.id,
            epoch: self.epoch,
            high_watermark,
            current_voters,
            observers,
        }
    }

    fn describe_replica(&self, state: &ReplicaState, now: i64) -> ReplicaDescription {
        let is_local = state.replica_key.id == self.local_replica_key.id;
        ReplicaDescription {
            replica_id: state.replica_key.id,
            log_end_offset: state.end_offset.as_ref().map(|e| e.offset as i64).unwrap_or(-1),
            last_caught_up_timestamp: if is_local { now } else { state.last_caught_up_timestamp },
            last_fetch_timestamp: if is_local { now } else { state.last_fetch_timestamp },
        }
    }

    fn gc_observers(&mut self, now: i64) {
        let local_key = self.local_replica_key;
        self.registry.observers_mut().retain(|key, state| {
            *key == local_key || now.saturating_sub(state.last_fetch_timestamp) < OBSERVER_SESSION_TIMEOUT_MS
        });
    }

    // ---- vote granting and resignation (spec.md §4.8) ----

    /// A thread-safe handle the driver can hand to another thread so it can
    /// request resignation without touching `self` directly.
    pub fn resign_handle(&self) -> Arc<AtomicBool> {
        self.resign_requested.clone()
    }

    pub fn request_resign(&self) {
        self.resign_requested.store(true, AtomicOrdering::Release);
    }

    pub fn is_resign_requested(&self) -> bool {
        self.resign_requested.load(AtomicOrdering::Acquire)
    }

    pub fn close(&mut self) {
        self.accumulator.close();
    }
}
