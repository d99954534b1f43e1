use chrono::NaiveDate;
use revise_core::{
    generate, move_entry, AcquisitionError, CandidateSchedule, ConstraintSet, EntryKind,
    ExclusionReason, GenerationBrief, MoveError, PlanningRequest, RejectionReason, ScheduleError,
    SharedSchedule,
};
use serde_json::{json, Value};
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("request.json")
}

fn request() -> PlanningRequest {
    let body = std::fs::read_to_string(fixture_path()).unwrap();
    serde_json::from_str(&body).unwrap()
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn entry(time: &str, duration: u32, topic: &str, kind: &str) -> Value {
    json!({ "time": time, "duration": duration, "topic": topic, "type": kind })
}

fn generate_with(candidate: Value) -> Result<revise_core::Generation, ScheduleError> {
    let raw = format!("Here is the plan:\n```json\n{}\n```", json!({ "schedule": candidate }));
    let source = move |_: &GenerationBrief| -> Result<String, AcquisitionError> { Ok(raw.clone()) };
    generate(&request(), &source)
}

/// A candidate with one mistake of every kind, plus a handful of good entries.
fn mixed_candidate() -> Value {
    json!({
        "2024-03-12": [
            entry("17:00", 60, "Quadratics", "practice"),
            entry("16:00", 45, "Macbeth essay", "homework"),
            entry("18:30", 45, "badminton", "practice"),
            entry("19:00", 30, "Quadratic Equations", "practice"),
            { "type": "break", "topic": "Break" }
        ],
        "2024-03-13": [
            entry("17:30", 45, "Poetry Anthology", "revision"),
            entry("16:00", 60, "Badminton", "event"),
            entry("19:00", 45, "Cell Structure", "exam_questions")
        ],
        "2024-03-14": [
            entry("16:00", 60, "Vectors", "practice"),
            entry("17:30", 45, "Cell Structure", "revision")
        ],
        "2024-03-15": [
            entry("16:00", 45, "Macbeth essay", "homework")
        ],
        "2024-03-16": [
            entry("10:00", 60, "Vectors", "practice"),
            entry("11:15", 15, "Vectors", "quiz")
        ]
    })
}

#[test]
fn test_builder_excludes_homework_due_on_first_day() {
    let set = ConstraintSet::build(&request()).unwrap();
    assert_eq!(set.excluded_homework.len(), 1);
    assert_eq!(set.excluded_homework[0].title, "Algebra worksheet");
    assert_eq!(set.excluded_homework[0].reason, ExclusionReason::DueBeforeWindow);

    let brief = GenerationBrief::compile(&set);
    assert!(!brief.homework_plan.iter().any(|h| h.title == "Algebra worksheet"));
    assert!(brief.render_prompt().contains("Keep Sunday evenings free"));
}

#[test]
fn test_scenario_homework_on_due_date_is_rejected() {
    let generation = generate_with(mixed_candidate()).unwrap();
    let rejected: Vec<_> = generation
        .ledger
        .rejections
        .iter()
        .filter(|r| r.reason == RejectionReason::DeadlineViolation)
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].date, "2024-03-15");
    assert!(generation.schedule.day(d(15)).is_empty());
}

#[test]
fn test_scenario_event_title_never_becomes_a_session() {
    let generation = generate_with(mixed_candidate()).unwrap();
    assert_eq!(generation.ledger.count(RejectionReason::EventImpersonation), 2);
    for (_, e) in generation.schedule.entries() {
        assert_ne!(e.topic.to_lowercase(), "badminton");
    }
}

#[test]
fn test_scenario_test_day_blacks_out_subject_only() {
    let generation = generate_with(mixed_candidate()).unwrap();
    assert_eq!(generation.ledger.count(RejectionReason::TestDayViolation), 1);
    let topics: Vec<&str> = generation
        .schedule
        .day(d(14))
        .iter()
        .map(|e| e.topic.as_str())
        .collect();
    assert_eq!(topics, vec!["Cell Structure"]);
}

#[test]
fn test_scenario_unknown_identity_and_foreign_type() {
    let generation = generate_with(mixed_candidate()).unwrap();
    assert_eq!(generation.ledger.count(RejectionReason::UnknownIdentity), 1);
    assert_eq!(generation.ledger.count(RejectionReason::ForbiddenType), 1);
    assert_eq!(generation.ledger.rejections.len(), 6);
}

#[test]
fn test_scenario_overlap_is_retained_with_flag() {
    let generation = generate_with(mixed_candidate()).unwrap();
    let day = generation.schedule.day(d(13));
    let poetry = day.iter().find(|e| e.topic == "Poetry Anthology").unwrap();
    assert!(poetry.overlap_warning);
    assert_eq!(generation.ledger.overlaps.len(), 1);
}

#[test]
fn test_scenario_breaks_obey_event_and_test_day_rules() {
    let set = ConstraintSet::build(&request()).unwrap();
    let candidate = json!({
        "2024-03-13": [
            entry("17:00", 60, "Badminton", "break"),
            entry("19:00", 10, "Stretch and water", "break")
        ],
        "2024-03-14": [
            { "topic": "Quadratics revision", "subject": "Mathematics", "type": "break" }
        ]
    });
    let Value::Object(map) = candidate else { unreachable!() };
    let outcome = revise_core::validate(&CandidateSchedule::from_map(map), &set);

    assert_eq!(outcome.ledger.count(RejectionReason::EventImpersonation), 1);
    assert_eq!(outcome.ledger.count(RejectionReason::TestDayViolation), 1);
    let kept: Vec<_> = outcome.entries[&d(13)]
        .iter()
        .map(|e| (e.topic.as_str(), e.kind))
        .collect();
    assert_eq!(kept, vec![("Break", EntryKind::Break)]);
    assert!(!outcome.entries.contains_key(&d(14)));
}

#[test]
fn test_schedule_properties_hold() {
    let set = ConstraintSet::build(&request()).unwrap();
    let generation = generate_with(mixed_candidate()).unwrap();

    for (date, e) in generation.schedule.entries() {
        match e.kind {
            EntryKind::Break => {}
            EntryKind::Homework => {
                let hw = set.identities.homework(&e.topic).unwrap();
                assert!(date < hw.due_date);
                assert_eq!(e.homework_due_date, Some(hw.due_date));
            }
            _ => {
                let topic = set.identities.topic(&e.topic).unwrap();
                assert_eq!(topic.name, e.topic);
                assert!(!set.is_test_day(&topic.subject_id, date));
            }
        }
        assert!(set.identities.event(&e.topic).is_none());
        assert!(!e.id.is_empty());
    }

    for entries in generation.schedule.0.values() {
        assert!(!entries.is_empty());
        let keys: Vec<_> = entries.iter().map(|e| (e.time.is_none(), e.time)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    let json = serde_json::to_value(&generation.schedule).unwrap();
    assert!(json.as_object().unwrap().contains_key("2024-03-12"));
    assert!(!json.to_string().contains("\"type\":\"event\""));
}

#[test]
fn test_validator_rerun_is_idempotent() {
    let set = ConstraintSet::build(&request()).unwrap();
    let generation = generate_with(mixed_candidate()).unwrap();

    let again = serde_json::to_string(&json!({ "schedule": generation.schedule })).unwrap();
    let outcome = revise_core::validate(&CandidateSchedule::parse(&again).unwrap(), &set);
    assert!(outcome.ledger.rejections.is_empty());
    assert_eq!(outcome.kept(), generation.schedule.entry_count());
}

#[test]
fn test_scenario_move_with_stale_id_is_not_found() {
    let generation = generate_with(mixed_candidate()).unwrap();
    let before = generation.schedule.clone();
    let err = move_entry(&before, "session-1999-01-01-0", d(16), &[]).unwrap_err();
    assert_eq!(err, MoveError::NotFound("session-1999-01-01-0".into()));

    let shared = SharedSchedule::new(before.clone());
    assert!(shared.move_entry("nope", d(16), &[]).is_err());
    assert_eq!(shared.into_inner(), before);
}

#[test]
fn test_move_onto_event_warns_and_flags() {
    let set = ConstraintSet::build(&request()).unwrap();
    let generation = generate_with(mixed_candidate()).unwrap();
    let id = generation.schedule.day(d(12))[1].id.clone();
    assert_eq!(generation.schedule.day(d(12))[1].topic, "Quadratics");

    let out = move_entry(&generation.schedule, &id, d(13), &set.blocked).unwrap();
    let moved = out.schedule.entries().find(|(_, e)| e.id == id).unwrap();
    assert_eq!(moved.0, d(13));
    assert!(moved.1.overlap_warning);
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.schedule.entry_count(), generation.schedule.entry_count());
}
