//! Last-write-wins conflict resolution with loop suppression.

use crate::envelope::ChangeOp;

/// Echoes of our own writes return through CDC within this window.
pub const LOOP_SUPPRESSION_WINDOW_MS: i64 = 1_000;

/// Window in which timestamps are considered tied and versions decide.
pub const VERSION_TIE_WINDOW_MS: i64 = 100;

/// Local row coordinates the resolver compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowState {
    pub updated_at_ms: i64,
    /// Defaults to 0 where the sink row carries no version.
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyReason {
    NewRecord,
    DeleteOfAbsent,
    DeleteOperation,
    NewerTimestamp,
    HigherVersion,
}

impl ApplyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyReason::NewRecord => "new_record",
            ApplyReason::DeleteOfAbsent => "delete_of_absent",
            ApplyReason::DeleteOperation => "delete_operation",
            ApplyReason::NewerTimestamp => "newer_timestamp",
            ApplyReason::HigherVersion => "higher_version",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LoopPreventionRapidUpdate,
    OlderTimestamp,
    SameOrOlderVersion,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::LoopPreventionRapidUpdate => "loop_prevention_rapid_update",
            SkipReason::OlderTimestamp => "older_timestamp",
            SkipReason::SameOrOlderVersion => "same_or_older_version",
        }
    }
}

/// Resolver verdict with its logged reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Apply(ApplyReason),
    Skip(SkipReason),
}

impl Resolution {
    pub fn reason(&self) -> &'static str {
        match self {
            Resolution::Apply(reason) => reason.as_str(),
            Resolution::Skip(reason) => reason.as_str(),
        }
    }
}

/// Decide whether an incoming change should be applied over the local row.
///
/// Deletes always apply. For upserts the comparison is last-write-wins on
/// `updated_at`, with a near-simultaneous incoming timestamp treated as our
/// own write echoing back through CDC. Versions break exact timestamp ties.
pub fn resolve(
    op: ChangeOp,
    local: Option<RowState>,
    incoming_ts_ms: Option<i64>,
    incoming_version: i64,
) -> Resolution {
    let local = match local {
        Some(state) => state,
        None => {
            return Resolution::Apply(match op {
                ChangeOp::Delete => ApplyReason::DeleteOfAbsent,
                _ => ApplyReason::NewRecord,
            });
        }
    };

    if op == ChangeOp::Delete {
        return Resolution::Apply(ApplyReason::DeleteOperation);
    }

    // An upsert with no event time cannot prove it is newer.
    let incoming_ts = match incoming_ts_ms {
        Some(ts) => ts,
        None => return Resolution::Skip(SkipReason::OlderTimestamp),
    };

    let delta = (incoming_ts - local.updated_at_ms).abs();
    if delta > 0 && delta < LOOP_SUPPRESSION_WINDOW_MS {
        return Resolution::Skip(SkipReason::LoopPreventionRapidUpdate);
    }
    if incoming_ts > local.updated_at_ms {
        return Resolution::Apply(ApplyReason::NewerTimestamp);
    }
    if delta < VERSION_TIE_WINDOW_MS {
        // Only reachable at exact timestamp equality.
        if incoming_version > local.version {
            return Resolution::Apply(ApplyReason::HigherVersion);
        }
        return Resolution::Skip(SkipReason::SameOrOlderVersion);
    }
    Resolution::Skip(SkipReason::OlderTimestamp)
}
