//! revise-core: timetable generation and reconciliation engine for student revision plans

pub mod assembler;
pub mod brief;
pub mod candidate;
pub mod constraints;
pub mod duration;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod reconcile;
pub mod resources;
pub mod time;
pub mod validator;

pub use assembler::assemble;
pub use brief::GenerationBrief;
pub use candidate::{extract_payload, CandidateSchedule};
pub use constraints::{
    BlockSource, BlockedInterval, ConstraintSet, ExcludedHomework, ExclusionReason, TimeWindow,
};
pub use duration::{duration_policy, DurationBand, DurationPolicy, IntensityTier};
pub use engine::{generate, generate_from_candidate, CandidateSource, Generation};
pub use error::{AcquisitionError, MoveError, ScheduleError};
pub use identity::IdentitySet;
pub use model::{
    BlockedEvent, EntryKind, Homework, PlanningRequest, Preferences, Schedule, ScheduleEntry,
    StudyMode, Subject, TestDate, Topic,
};
pub use reconcile::{move_entry, move_event, MoveOutcome, MoveWarning, SharedSchedule};
pub use time::ClockTime;
pub use validator::{validate, Rejection, RejectionLedger, RejectionReason, ValidationOutcome};
