use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use raft_leader_state::BatchAccumulator;
use raft_leader_state::ControlRecord;
use raft_leader_state::Endpoints;
use raft_leader_state::FromControlRecord;
use raft_leader_state::KRaftVersion;
use raft_leader_state::LeaderState;
use raft_leader_state::LogOffsetMetadata;
use raft_leader_state::ReplicaKey;
use raft_leader_state::VoterNode;
use raft_leader_state::VoterSet;
use raft_leader_state::BOOTSTRAP_CHECKPOINT_OFFSET;

/// Test-only record type: just remembers which control records were built.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TestRecord(ControlRecord);

impl FromControlRecord for TestRecord {
    fn from_control_record(record: ControlRecord) -> Self {
        TestRecord(record)
    }
}

/// Test-only accumulator double: records every append/drain/close call so
/// tests can assert on the bootstrap emission without a real log store.
#[derive(Debug, Default)]
struct TestAccumulator {
    appended: Vec<TestRecord>,
    drains: u32,
    closed: bool,
}

impl BatchAccumulator<TestRecord> for TestAccumulator {
    fn append_control_messages(&mut self, _now: i64, records: Vec<TestRecord>) {
        self.appended.extend(records);
    }

    fn force_drain(&mut self) {
        self.drains += 1;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

type TestLeaderState = LeaderState<TestRecord, TestAccumulator>;

fn voter_set(ids: &[i64]) -> VoterSet {
    let mut vs = VoterSet::default();
    for &id in ids {
        vs.insert(VoterNode { voter_key: ReplicaKey::bare(id), endpoints: Endpoints::default() });
    }
    vs
}

fn new_leader(local_id: i64, voters: &[i64], epoch_start_offset: u64, fetch_timeout_ms: i64) -> TestLeaderState {
    LeaderState::new(
        ReplicaKey::bare(local_id),
        1,
        epoch_start_offset,
        voters.iter().copied().collect::<BTreeSet<_>>(),
        Endpoints::default(),
        voter_set(voters),
        Some(BOOTSTRAP_CHECKPOINT_OFFSET),
        KRaftVersion(1),
        fetch_timeout_ms,
        TestAccumulator::default(),
        0,
    )
}

fn offset(o: u64) -> LogOffsetMetadata {
    LogOffsetMetadata::bare(o)
}

/// S1 — HW advancement with 3 voters {1 (leader), 2, 3}, epochStartOffset=10.
#[test]
fn s1_hw_advances_on_majority_replication() {
    let mut leader = new_leader(1, &[1, 2, 3], 10, 1000);

    let advanced = leader.update_local_state(0, offset(15), &voter_set(&[1, 2, 3])).unwrap();
    assert!(!advanced);
    assert_eq!(leader.high_watermark(), None);

    // sorted offsets now [15 (local), 12 (v2), absent (v3)]; m=1 -> candidate=12 > 10:
    // the high watermark is established for the first time.
    let advanced = leader.update_replica_state(ReplicaKey::bare(2), 1, offset(12)).unwrap();
    assert!(advanced);
    assert_eq!(leader.high_watermark().map(|h| h.offset), Some(12));

    // sorted offsets now [15, 12, 11]; m=1 -> candidate still 12: no change.
    let advanced = leader.update_replica_state(ReplicaKey::bare(3), 2, offset(11)).unwrap();
    assert!(!advanced);
    assert_eq!(leader.high_watermark().map(|h| h.offset), Some(12));

    let advanced = leader.update_replica_state(ReplicaKey::bare(2), 3, offset(15)).unwrap();
    // sorted offsets now [15 (local), 15 (v2), 11 (v3)]; m=1 -> candidate=15 > 10
    assert!(advanced);
    assert_eq!(leader.high_watermark().map(|h| h.offset), Some(15));
}

/// S2 — epoch commitment rule blocks HW until it strictly exceeds
/// epochStartOffset.
#[test]
fn s2_epoch_commitment_rule_blocks_hw() {
    let mut leader = new_leader(1, &[1, 2, 3], 10, 1000);

    leader.update_local_state(0, offset(10), &voter_set(&[1, 2, 3])).unwrap();
    leader.update_replica_state(ReplicaKey::bare(2), 1, offset(10)).unwrap();
    let advanced = leader.update_replica_state(ReplicaKey::bare(3), 2, offset(10)).unwrap();

    assert!(!advanced);
    assert_eq!(leader.high_watermark(), None);
}

/// S3 — a singleton voter set never loses quorum.
#[test]
fn s3_singleton_voter_set_never_expires() {
    let leader = new_leader(1, &[1], 0, 1000);
    assert_eq!(leader.time_until_check_quorum_expires(0), i64::MAX);
    assert_eq!(leader.time_until_check_quorum_expires(1_000_000_000), i64::MAX);
}

/// S4 — check-quorum majority accounting with the leader counted implicitly.
#[test]
fn s4_check_quorum_majority_counts_leader_implicitly() {
    let mut leader = new_leader(1, &[1, 2, 3, 4, 5], 0, 1000);

    // Majority of 5 is 3; leader counts as one of the 3, so 2 external
    // acknowledging fetches are enough to reset the timer.
    let before = leader.time_until_check_quorum_expires(0);
    assert_eq!(before, 1500);

    leader.update_replica_state(ReplicaKey::bare(2), 100, offset(1)).unwrap();
    // one fetch: not yet enough
    assert!(leader.time_until_check_quorum_expires(100) < 1500);

    leader.update_replica_state(ReplicaKey::bare(3), 200, offset(1)).unwrap();
    // two fetches: timer should have been reset at t=200
    assert_eq!(leader.time_until_check_quorum_expires(200), 1500);
}

/// A voter's fetch must stop counting toward check-quorum majority once it
/// is demoted out of the voter set by a reconfiguration. `fetchedVoters`
/// must stay a subset of the current voter ids (spec.md §3 invariant 4).
#[test]
fn fetched_voters_pruned_on_reconfiguration() {
    let mut leader = new_leader(1, &[1, 2, 3, 4, 5], 0, 1000);

    // Voter 4 fetches; alone this is below the majority-minus-leader
    // threshold of 2 for 5 voters, so the timer is not reset.
    leader.update_replica_state(ReplicaKey::bare(4), 100, offset(1)).unwrap();

    // Reconfigure: 4 and 5 are demoted to observers, 6 and 7 promoted.
    leader.update_local_state(200, offset(1), &voter_set(&[1, 2, 3, 6, 7])).unwrap();

    // Only voter 6, a *current* voter, has fetched since the reconfiguration.
    // If voter 4's stale entry were still counted, this single fetch would
    // wrongly reach the threshold of 2 and reset the timer early.
    leader.update_replica_state(ReplicaKey::bare(6), 300, offset(1)).unwrap();
    assert_eq!(leader.time_until_check_quorum_expires(300), 1200);

    // A second *current* voter fetching does reach the threshold.
    leader.update_replica_state(ReplicaKey::bare(7), 400, offset(1)).unwrap();
    assert_eq!(leader.time_until_check_quorum_expires(400), 1500);
}

/// S5 — voter demotion to observer on reconfiguration.
#[test]
fn s5_voter_demotion_on_reconfiguration() {
    let mut leader = new_leader(1, &[1, 2, 3], 0, 1000);
    leader.update_replica_state(ReplicaKey::bare(3), 0, offset(5)).unwrap();

    leader.update_local_state(1, offset(1), &voter_set(&[1, 2, 4])).unwrap();

    let info = leader.describe_quorum(1);
    let voter_ids: BTreeSet<i64> = info.current_voters.iter().map(|r| r.replica_id).collect();
    assert_eq!(voter_ids, BTreeSet::from([1, 2, 4]));

    let observer_ids: BTreeSet<i64> = info.observers.iter().map(|r| r.replica_id).collect();
    assert!(observer_ids.contains(&3));

    let demoted = info.observers.iter().find(|r| r.replica_id == 3).unwrap();
    assert_eq!(demoted.log_end_offset, 5);
}

/// S6 — observer GC evicts silent observers but never the local replica.
#[test]
fn s6_observer_gc_spares_local_replica() {
    let mut leader = new_leader(1, &[1, 2], 0, 1000);

    // Observer X fetches once at t=0, then goes silent.
    leader.update_replica_state(ReplicaKey::bare(99), 0, offset(1)).unwrap();

    let info = leader.describe_quorum(300_001);
    assert!(info.observers.iter().all(|r| r.replica_id != 99));
}

/// S6 variant — a leader that is not itself a current voter (e.g. it is
/// mid-removal but still leading until the removal commits) still has an
/// observer entry for itself, and that entry is never GC'd regardless of
/// how stale its timestamps are.
#[test]
fn observer_leader_own_entry_survives_gc() {
    let mut leader = new_leader(1, &[2, 3], 0, 1000);
    leader.update_local_state(0, offset(1), &voter_set(&[2, 3])).unwrap();

    let info = leader.describe_quorum(300_001);
    assert!(info.current_voters.iter().all(|r| r.replica_id != 1));
    assert!(info.observers.iter().any(|r| r.replica_id == 1));
}

#[test]
fn fetch_from_non_replica_id_is_a_no_op() {
    let mut leader = new_leader(1, &[1, 2], 0, 1000);
    let advanced = leader.update_replica_state(ReplicaKey::bare(-1), 0, offset(5)).unwrap();
    assert!(!advanced);
    assert_eq!(leader.describe_quorum(0).observers.len(), 0);
}

#[test]
fn fetch_from_self_is_rejected() {
    let mut leader = new_leader(1, &[1, 2], 0, 1000);
    let err = leader.update_replica_state(ReplicaKey::bare(1), 0, offset(5)).unwrap_err();
    assert!(matches!(err, raft_leader_state::LeaderStateError::InvalidState(_)));
}

#[test]
fn local_end_offset_cannot_move_backwards() {
    let mut leader = new_leader(1, &[1], 0, 1000);
    leader.update_local_state(0, offset(10), &voter_set(&[1])).unwrap();
    let err = leader.update_local_state(1, offset(5), &voter_set(&[1])).unwrap_err();
    assert!(matches!(err, raft_leader_state::LeaderStateError::InvalidState(_)));
}

#[test]
fn acknowledgement_from_non_voter_is_rejected() {
    let mut leader = new_leader(1, &[1, 2], 0, 1000);
    assert!(leader.add_acknowledgement_from(99).is_err());
    assert!(leader.add_acknowledgement_from(2).is_ok());
}

#[test]
fn can_grant_vote_is_always_false() {
    let leader = new_leader(1, &[1, 2, 3], 0, 1000);
    assert!(!leader.can_grant_vote(ReplicaKey::bare(2), true));
    assert!(!leader.can_grant_vote(ReplicaKey::bare(99), false));
}

#[test]
fn resign_flag_is_visible_across_the_handle() {
    let leader = new_leader(1, &[1], 0, 1000);
    let handle = leader.resign_handle();
    assert!(!leader.is_resign_requested());
    handle.store(true, std::sync::atomic::Ordering::Release);
    assert!(leader.is_resign_requested());
}

#[test]
fn leader_change_bootstrap_emits_kraft_version_and_voters_from_checkpoint() {
    let mut leader = new_leader(1, &[1, 2, 3], 0, 1000);
    leader.append_leader_change_message_and_bootstrap_records(0).unwrap();
}

#[test]
fn leader_change_bootstrap_rejects_checkpoint_with_unsupported_kraft_version() {
    let mut leader: TestLeaderState = LeaderState::new(
        ReplicaKey::bare(1),
        1,
        0,
        maplit::btreeset! {1},
        Endpoints::default(),
        voter_set(&[1]),
        Some(BOOTSTRAP_CHECKPOINT_OFFSET),
        KRaftVersion::ZERO,
        1000,
        TestAccumulator::default(),
        0,
    );
    let err = leader.append_leader_change_message_and_bootstrap_records(0).unwrap_err();
    assert!(matches!(err, raft_leader_state::LeaderStateError::InvalidState(_)));
}

#[test]
fn leader_change_bootstrap_skips_voters_record_when_not_from_checkpoint() {
    let mut leader: TestLeaderState = LeaderState::new(
        ReplicaKey::bare(1),
        1,
        0,
        maplit::btreeset! {1},
        Endpoints::default(),
        voter_set(&[1]),
        Some(42), // from the log, not a bootstrap checkpoint
        KRaftVersion::ZERO,
        1000,
        TestAccumulator::default(),
        0,
    );
    // Must not fail even though the kraft version doesn't support
    // reconfiguration: the bootstrap records are only required when the
    // voter set came from a checkpoint.
    leader.append_leader_change_message_and_bootstrap_records(0).unwrap();
}

/// Invariant: `non_acknowledging_voters` never includes the leader itself,
/// and starts out containing every other voter.
#[test]
fn non_acknowledging_voters_excludes_leader() {
    let leader = new_leader(1, &[1, 2, 3], 0, 1000);
    let pending: BTreeSet<i64> = leader.non_acknowledging_voters().iter().map(|k| k.id).collect();
    assert_eq!(pending, BTreeSet::from([2, 3]));
}

/// Invariant: begin-quorum timer fires immediately on a fresh leader state.
#[test]
fn begin_quorum_timer_fires_immediately_for_new_leader() {
    let leader = new_leader(1, &[1, 2, 3], 0, 1000);
    assert_eq!(leader.time_until_begin_quorum_epoch_timer_expires(0), 0);
}
