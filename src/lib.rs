//! Leader-side quorum and high-watermark bookkeeping for a Raft variant
//! whose cluster membership is itself stored in the replicated log.
//!
//! A [`LeaderState`] is created once per elected epoch and holds the
//! leader's view of its followers: who they are, how far each has
//! replicated, and when the leader must step down because it has lost
//! contact with a majority. It does not itself drive the network, the log
//! store, or the Leader/Follower/Candidate state machine that owns it —
//! those are external collaborators that feed it offsets, fetches, and
//! membership changes, and consume the high-watermark advances and
//! check-quorum expirations it produces in return.

mod accumulator;
mod describe;
mod error;
mod leader_state;
mod log_offset;
mod membership;
mod registry;
mod replica_key;
mod replica_state;
mod timers;

pub use accumulator::BatchAccumulator;
pub use accumulator::ControlRecord;
pub use accumulator::FromControlRecord;
pub use accumulator::LEADER_CHANGE_MESSAGE_CURRENT_VERSION;
pub use describe::QuorumInfo;
pub use describe::ReplicaDescription;
pub use error::InvalidArgument;
pub use error::InvalidState;
pub use error::LeaderStateError;
pub use leader_state::LeaderAndEpoch;
pub use leader_state::LeaderState;
pub use leader_state::BOOTSTRAP_CHECKPOINT_OFFSET;
pub use log_offset::LogOffsetMetadata;
pub use membership::Endpoints;
pub use membership::KRaftVersion;
pub use membership::VoterNode;
pub use membership::VoterSet;
pub use replica_key::ReplicaKey;
pub use replica_state::ReplicaState;
pub use timers::CHECK_QUORUM_TIMEOUT_FACTOR;
pub use timers::OBSERVER_SESSION_TIMEOUT_MS;
