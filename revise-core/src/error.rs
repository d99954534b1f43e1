//! Error types for the timetable engine.
//!
//! Request-level failures abort a generation and surface as a single
//! `ScheduleError`. Per-entry problems never abort anything; they land in the
//! `RejectionLedger` (see `crate::validator`).

use std::time::Duration;

use thiserror::Error;

use crate::validator::RejectionLedger;

/// Fatal errors for one generation request.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The planning request failed validation before anything was sent out.
    #[error("invalid planning input: {}", .0.join("; "))]
    InputInvalid(Vec<String>),

    /// The candidate source failed or timed out.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The candidate payload could not be recovered as a schedule object.
    #[error("invalid candidate schedule format: {0}")]
    Parse(String),

    /// Every candidate entry was rejected (or none were produced).
    #[error("no usable sessions survived validation ({} rejected)", .ledger.rejections.len())]
    EmptyResult { ledger: Box<RejectionLedger> },
}

/// Failures from the external candidate producer.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("candidate generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("candidate generator rate limited; try again in a moment")]
    RateLimited,

    #[error("candidate generator credits exhausted")]
    QuotaExhausted,

    #[error("candidate generator returned an empty response")]
    Empty,

    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

/// Failures from the drag-move engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    /// No entry with this id exists; nothing was changed.
    #[error("schedule entry not found: {0}")]
    NotFound(String),

    /// The moved item's local start time does not exist on the target date.
    #[error("local time {time} does not exist on {date} in {tz}")]
    InvalidLocalTime {
        date: String,
        time: String,
        tz: String,
    },
}

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;
