//! Generation pipeline: builder, compiler, acquisition, validator, assembler.

use serde::Serialize;
use tracing::{info, info_span};

use crate::assembler::assemble;
use crate::brief::GenerationBrief;
use crate::candidate::CandidateSchedule;
use crate::constraints::{ConstraintSet, ExcludedHomework};
use crate::error::{AcquisitionError, Result, ScheduleError};
use crate::model::{PlanningRequest, Schedule};
use crate::validator::{validate, RejectionLedger};

/// Produces a raw candidate schedule from a brief. Implementations decide how
/// (a language model, a file, a fixture); the engine only sees the text.
pub trait CandidateSource {
    fn acquire(&self, brief: &GenerationBrief) -> std::result::Result<String, AcquisitionError>;
}

impl<F> CandidateSource for F
where
    F: Fn(&GenerationBrief) -> std::result::Result<String, AcquisitionError>,
{
    fn acquire(&self, brief: &GenerationBrief) -> std::result::Result<String, AcquisitionError> {
        self(brief)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub schedule: Schedule,
    pub ledger: RejectionLedger,
    pub excluded_homework: Vec<ExcludedHomework>,
    #[serde(skip)]
    pub brief: GenerationBrief,
}

/// Run one generation request end to end.
pub fn generate(req: &PlanningRequest, source: &dyn CandidateSource) -> Result<Generation> {
    let span = info_span!("generate", start = %req.start_date, end = %req.end_date);
    let _enter = span.enter();

    let set = ConstraintSet::build(req)?;
    let brief = GenerationBrief::compile(&set);
    info!(
        topics = brief.topics.len(),
        homework = brief.homework.len(),
        blocked = brief.blocked.len(),
        "brief compiled"
    );

    let raw = source.acquire(&brief)?;
    if raw.trim().is_empty() {
        return Err(AcquisitionError::Empty.into());
    }
    info!(bytes = raw.len(), "candidate acquired");

    generate_from_candidate(&set, brief, &raw)
}

/// Validate and assemble an already-acquired candidate.
pub fn generate_from_candidate(
    set: &ConstraintSet,
    brief: GenerationBrief,
    raw: &str,
) -> Result<Generation> {
    let candidate = CandidateSchedule::parse(raw)?;
    let outcome = validate(&candidate, set);
    let schedule = assemble(outcome.entries);

    if schedule.is_empty() {
        return Err(ScheduleError::EmptyResult {
            ledger: Box::new(outcome.ledger),
        });
    }
    info!(
        days = schedule.0.len(),
        entries = schedule.entry_count(),
        "{}",
        outcome.ledger.summary()
    );

    Ok(Generation {
        schedule,
        ledger: outcome.ledger,
        excluded_homework: set.excluded_homework.clone(),
        brief,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DayTimeSlot, DurationMode, Preferences, SchoolHours, StudyMode, Subject, Topic,
    };
    use chrono::NaiveDate;
    use std::cell::Cell;

    struct FixedCandidate(&'static str);

    impl CandidateSource for FixedCandidate {
        fn acquire(&self, _brief: &GenerationBrief) -> std::result::Result<String, AcquisitionError> {
            Ok(self.0.to_string())
        }
    }

    fn request() -> PlanningRequest {
        PlanningRequest {
            subjects: vec![Subject {
                id: "p".into(),
                name: "Physics".into(),
                exam_board: "OCR".into(),
                mode: StudyMode::NoExam,
            }],
            topics: vec![Topic { name: "Waves".into(), subject_id: "p".into() }],
            test_dates: vec![],
            preferences: Preferences {
                daily_study_hours: 1.0,
                day_time_slots: vec![DayTimeSlot {
                    day: "Thursday".into(),
                    start_time: "17:00".into(),
                    end_time: "19:00".into(),
                    enabled: true,
                }],
                session_duration: 30,
                break_duration: 5,
                duration_mode: DurationMode::Fixed,
                ai_notes: None,
                school: SchoolHours::default(),
                timezone: None,
            },
            homeworks: vec![],
            topic_analysis: None,
            ai_notes: None,
            events: vec![],
            peak_performance: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            timetable_mode: None,
        }
    }

    #[test]
    fn test_generate_runs_every_phase() {
        let source = FixedCandidate(
            r#"```json
{"schedule": {"2024-01-11": [
  {"time": "17:30", "duration": 30, "topic": "waves", "type": "practice"},
  {"time": "17:00", "duration": 30, "topic": "Optics", "type": "practice"}
]}}
```"#,
        );
        let generation = generate(&request(), &source).unwrap();
        let day = generation
            .schedule
            .day(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].topic, "Waves");
        assert_eq!(day[0].id, "session-2024-01-11-0");
        assert_eq!(day[0].mode.as_deref(), Some("balanced"));
        assert_eq!(generation.ledger.rejections.len(), 1);
    }

    #[test]
    fn test_invalid_input_never_reaches_the_source() {
        let called = Cell::new(false);
        let source = |_: &GenerationBrief| -> std::result::Result<String, AcquisitionError> {
            called.set(true);
            Ok(String::new())
        };
        let mut req = request();
        req.preferences.break_duration = 0;
        let err = generate(&req, &source).unwrap_err();
        assert!(matches!(err, ScheduleError::InputInvalid(_)));
        assert!(!called.get());
    }

    #[test]
    fn test_everything_rejected_is_empty_result() {
        let source = FixedCandidate(r#"{"schedule": {"2024-01-11": [{"time": "17:00", "duration": 30, "topic": "Gym", "type": "event"}]}}"#);
        match generate(&request(), &source) {
            Err(ScheduleError::EmptyResult { ledger }) => assert_eq!(ledger.rejections.len(), 1),
            other => panic!("expected EmptyResult, got {other:?}"),
        }
    }

    #[test]
    fn test_acquisition_errors_propagate() {
        let source = |_: &GenerationBrief| -> std::result::Result<String, AcquisitionError> {
            Err(AcquisitionError::RateLimited)
        };
        let err = generate(&request(), &source).unwrap_err();
        assert!(matches!(err, ScheduleError::Acquisition(AcquisitionError::RateLimited)));

        let empty = FixedCandidate("   ");
        assert!(matches!(
            generate(&request(), &empty),
            Err(ScheduleError::Acquisition(AcquisitionError::Empty))
        ));
    }

    #[test]
    fn test_unparseable_candidate_is_parse_error() {
        let source = FixedCandidate("I'm sorry, I can't produce a timetable right now.");
        assert!(matches!(generate(&request(), &source), Err(ScheduleError::Parse(_))));
    }
}
