use crate::membership::KRaftVersion;
use crate::membership::VoterSet;

/// Current wire version of the `LeaderChange` control record.
pub const LEADER_CHANGE_MESSAGE_CURRENT_VERSION: i16 = 0;

/// A control record the leader-change bootstrap emits at epoch start. See
/// `spec.md` §4.5. Exact byte layout is delegated to the log store; this
/// crate only decides which records to emit and in what order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRecord {
    LeaderChange { version: i16, leader_id: i64, voters: Vec<i64>, granting_voters: Vec<i64> },
    KRaftVersion { version: KRaftVersion },
    Voters { voter_set: VoterSet },
}

/// Lets a log-record type `R` be produced from a [`ControlRecord`], so
/// [`crate::LeaderState`] stays generic over how its caller represents log
/// entries.
pub trait FromControlRecord {
    fn from_control_record(record: ControlRecord) -> Self;
}

/// The subset of the batch accumulator's contract this crate consumes:
/// append control messages, force them into their own batch, and release
/// the accumulator at epoch end. Everything else about the accumulator
/// (buffering, network flush, backpressure) is the accumulator's own
/// responsibility per `spec.md` §1 ("external collaborators").
pub trait BatchAccumulator<R> {
    fn append_control_messages(&mut self, now: i64, records: Vec<R>);
    fn force_drain(&mut self);
    fn close(&mut self);
}
