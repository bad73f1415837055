use crate::replica_key::ReplicaKey;
use crate::KRaftVersion;

/// Programmer-error conditions: the caller passed an argument that violates a
/// precondition of the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    #[error("cannot record an acknowledgement from {0}: not a current voter")]
    AcknowledgementFromNonVoter(i64),

    #[error("replica key refinement rejected: stored {stored:?} does not match requested {requested:?}")]
    ReplicaKeyMismatch { stored: ReplicaKey, requested: ReplicaKey },
}

/// Conditions that indicate the caller (or the surrounding state machine) is
/// driving this leader state in a way its own invariants forbid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("local end offset would move backwards: stored {stored}, proposed {proposed}")]
    NonMonotonicLocalEndOffset { stored: u64, proposed: u64 },

    #[error("remote replica id {0} collides with the local leader id")]
    FetchFromLeaderId(i64),

    #[error("kraft version {0:?} does not support reconfiguration; cannot emit bootstrap voter records")]
    ReconfigurationNotSupported(KRaftVersion),
}

/// The union of error conditions a [`crate::LeaderState`] operation can fail with.
///
/// Logged-but-tolerated conditions (a regressed follower fetch, a computed
/// high watermark that would retreat) are not represented here: they are
/// `tracing::warn!` events, not `Err` values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaderStateError {
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    #[error(transparent)]
    InvalidState(#[from] InvalidState),
}
