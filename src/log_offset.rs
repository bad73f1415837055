use std::cmp::Ordering;

use bytes::Bytes;

/// A log offset paired with opaque metadata distinguishing physically
/// distinct positions that share the same logical offset (e.g. across a
/// segment roll). Equality on `metadata` is used only to decide whether a
/// same-offset update is observable; it plays no part in ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOffsetMetadata {
    pub offset: u64,
    pub metadata: Bytes,
}

impl LogOffsetMetadata {
    pub fn new(offset: u64, metadata: Bytes) -> Self {
        Self { offset, metadata }
    }

    /// Metadata-free offset, for tests and callers that don't care about the
    /// physical distinction.
    pub fn bare(offset: u64) -> Self {
        Self { offset, metadata: Bytes::new() }
    }
}

/// Orders `Option<LogOffsetMetadata>` with `Some` before `None` (absent
/// progress is worst), and `Some` values by `offset` ascending. Metadata is
/// not part of the order: two values at the same offset are equal for
/// ordering purposes even if their metadata differs.
pub(crate) fn cmp_end_offset(a: &Option<LogOffsetMetadata>, b: &Option<LogOffsetMetadata>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.offset.cmp(&b.offset),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
