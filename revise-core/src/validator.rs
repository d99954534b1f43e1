//! Schedule validator and repair pass.
//!
//! Every candidate entry goes through the same ordered checks and the first
//! failing check decides its fate. Rejections never abort the run; they are
//! recorded in the `RejectionLedger` alongside the raw entry that caused them.
//! Overlap with a blocked event is advisory: the entry is kept and flagged.
//!
//! Entries that survive are repaired in place (canonical titles, due dates,
//! notes, mode echo). Repair only fills or normalizes fields; it never drops
//! an entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::candidate::CandidateSchedule;
use crate::constraints::ConstraintSet;
use crate::model::{EntryKind, ScheduleEntry, BREAK_TOPIC};
use crate::resources::resource_hint;
use crate::time::ClockTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    Malformed,
    EventImpersonation,
    UnknownIdentity,
    DeadlineViolation,
    TestDayViolation,
    ForbiddenType,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::Malformed => "MALFORMED",
            RejectionReason::EventImpersonation => "EVENT_IMPERSONATION",
            RejectionReason::UnknownIdentity => "UNKNOWN_IDENTITY",
            RejectionReason::DeadlineViolation => "DEADLINE_VIOLATION",
            RejectionReason::TestDayViolation => "TEST_DAY_VIOLATION",
            RejectionReason::ForbiddenType => "FORBIDDEN_TYPE",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Date key exactly as the candidate wrote it.
    pub date: String,
    pub entry: Value,
    pub reason: RejectionReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapWarning {
    pub date: NaiveDate,
    pub topic: String,
    pub time: ClockTime,
    pub event: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RejectionLedger {
    pub rejections: Vec<Rejection>,
    pub overlaps: Vec<OverlapWarning>,
}

impl RejectionLedger {
    pub fn is_empty(&self) -> bool {
        self.rejections.is_empty() && self.overlaps.is_empty()
    }

    pub fn count(&self, reason: RejectionReason) -> usize {
        self.rejections.iter().filter(|r| r.reason == reason).count()
    }

    pub fn reasons(&self) -> BTreeMap<RejectionReason, usize> {
        let mut out = BTreeMap::new();
        for r in &self.rejections {
            *out.entry(r.reason).or_insert(0) += 1;
        }
        out
    }

    /// One-line summary, e.g. "3 sessions removed: 1 DEADLINE_VIOLATION, 2 UNKNOWN_IDENTITY".
    pub fn summary(&self) -> String {
        let mut out = if self.rejections.is_empty() {
            "no sessions removed".to_string()
        } else {
            let parts: Vec<String> = self
                .reasons()
                .into_iter()
                .map(|(reason, n)| format!("{n} {reason}"))
                .collect();
            format!("{} sessions removed: {}", self.rejections.len(), parts.join(", "))
        };
        if !self.overlaps.is_empty() {
            out.push_str(&format!("; {} overlap warning(s)", self.overlaps.len()));
        }
        out
    }
}

impl fmt::Display for RejectionLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for r in &self.rejections {
            writeln!(f, "  {} {:<20} {}", r.date, r.reason.as_str(), r.detail)?;
        }
        for o in &self.overlaps {
            writeln!(f, "  {} {} '{}' overlaps '{}'", o.date, o.time, o.topic, o.event)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub entries: BTreeMap<NaiveDate, Vec<ScheduleEntry>>,
    pub ledger: RejectionLedger,
}

impl ValidationOutcome {
    pub fn kept(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

type Verdict<T> = std::result::Result<T, (RejectionReason, String)>;

/// Structurally sound entry; `kind` is `None` for types outside the closed set.
struct Parsed {
    raw_type: String,
    kind: Option<EntryKind>,
    entry: ScheduleEntry,
}

/// Validate and repair a candidate against a read-only constraint set.
pub fn validate(candidate: &CandidateSchedule, set: &ConstraintSet) -> ValidationOutcome {
    let mut out = ValidationOutcome::default();

    for day in &candidate.days {
        for value in &day.entries {
            let verdict = match (day.date, day.is_list) {
                (None, _) => Err((
                    RejectionReason::Malformed,
                    format!("date key '{}' is not YYYY-MM-DD", day.key),
                )),
                (Some(_), false) => Err((
                    RejectionReason::Malformed,
                    "date value is not a list of entries".to_string(),
                )),
                (Some(date), true) => check_entry(date, value, set).map(|e| (date, e)),
            };

            match verdict {
                Ok((date, mut entry)) => {
                    flag_overlaps(date, &mut entry, set, &mut out.ledger);
                    out.entries.entry(date).or_default().push(entry);
                }
                Err((reason, detail)) => {
                    warn!(date = %day.key, %reason, %detail, "candidate entry rejected");
                    out.ledger.rejections.push(Rejection {
                        date: day.key.clone(),
                        entry: value.clone(),
                        reason,
                        detail,
                    });
                }
            }
        }
    }

    info!(
        kept = out.kept(),
        rejected = out.ledger.rejections.len(),
        overlaps = out.ledger.overlaps.len(),
        "candidate validated"
    );
    out
}

fn check_entry(date: NaiveDate, value: &Value, set: &ConstraintSet) -> Verdict<ScheduleEntry> {
    let Parsed { raw_type, kind, mut entry } = parse_structure(value)?;
    let ids = &set.identities;

    // Identity
    if let Some(event) = ids.event(&entry.topic).filter(|_| !entry.topic.trim().is_empty()) {
        return Err((
            RejectionReason::EventImpersonation,
            format!("'{}' is the blocked event '{event}'", entry.topic),
        ));
    }
    if kind == Some(EntryKind::Break) {
        return check_break(date, entry, set);
    }
    let is_homework = raw_type == "homework";
    let (canonical, subject_id, subject_name, due) = if is_homework {
        let hw = ids.homework(&entry.topic).ok_or_else(|| {
            (
                RejectionReason::UnknownIdentity,
                format!("'{}' is not a known homework title", entry.topic),
            )
        })?;
        let subject_id = ids
            .subject_id_for_name(&hw.subject)
            .or_else(|| ids.subject_id_for_name(&entry.subject))
            .map(str::to_string);
        (hw.title.clone(), subject_id, hw.subject.clone(), Some(hw.due_date))
    } else {
        let topic = ids.topic(&entry.topic).ok_or_else(|| {
            (
                RejectionReason::UnknownIdentity,
                format!("'{}' is not a known topic", entry.topic),
            )
        })?;
        let name = set
            .subject(&topic.subject_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        (topic.name.clone(), Some(topic.subject_id.clone()), name, None)
    };

    // Due date
    if let Some(due) = due {
        if date >= due {
            return Err((
                RejectionReason::DeadlineViolation,
                format!("'{canonical}' is due {due}, placed on {date}"),
            ));
        }
        if set.homework_due_dates.contains(&date) {
            return Err((
                RejectionReason::DeadlineViolation,
                format!("homework placed on {date}, a homework due date"),
            ));
        }
    }

    // Test day
    if let Some(id) = &subject_id {
        if set.is_test_day(id, date) {
            return Err((
                RejectionReason::TestDayViolation,
                format!("{date} is a {subject_name} test day"),
            ));
        }
    }

    // Foreign types
    let Some(kind) = kind else {
        return Err((
            RejectionReason::ForbiddenType,
            format!("type '{raw_type}' may not appear in a schedule"),
        ));
    };

    // Repair
    entry.kind = kind;
    entry.topic = canonical;
    entry.subject = subject_name;
    if kind == EntryKind::Homework {
        entry.homework_due_date = due;
    } else if entry.test_date.is_none() {
        entry.test_date = subject_id.as_deref().and_then(|id| set.upcoming_test(id));
    }
    if entry.notes.trim().is_empty() {
        entry.notes = resource_hint(kind, &entry.subject, &entry.topic);
    }
    if entry.mode.is_none() {
        entry.mode = Some(set.tier.as_str().to_string());
    }
    Ok(entry)
}

/// Breaks carry no identity of their own, but a subject label still ties them
/// to that subject's test days.
fn check_break(date: NaiveDate, mut entry: ScheduleEntry, set: &ConstraintSet) -> Verdict<ScheduleEntry> {
    if let Some(id) = set.identities.subject_id_for_name(&entry.subject) {
        if set.is_test_day(id, date) {
            return Err((
                RejectionReason::TestDayViolation,
                format!("{date} is a {} test day", entry.subject.trim()),
            ));
        }
    }
    entry.kind = EntryKind::Break;
    entry.topic = BREAK_TOPIC.to_string();
    if entry.mode.is_none() {
        entry.mode = Some(set.tier.as_str().to_string());
    }
    Ok(entry)
}

fn parse_structure(value: &Value) -> Verdict<Parsed> {
    let malformed = |detail: &str| (RejectionReason::Malformed, detail.to_string());

    let obj = value
        .as_object()
        .ok_or_else(|| malformed("entry is not an object"))?;
    let raw_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing type"))?;
    let kind = EntryKind::parse(&raw_type);
    let is_break = kind == Some(EntryKind::Break);

    let time = match obj.get("time") {
        None | Some(Value::Null) if is_break => None,
        None | Some(Value::Null) => return Err(malformed("missing time")),
        Some(v) => {
            let t = v
                .as_str()
                .and_then(|s| s.parse::<ClockTime>().ok())
                .ok_or_else(|| (RejectionReason::Malformed, format!("unparseable time {v}")))?;
            Some(t)
        }
    };
    let duration = match obj.get("duration") {
        None | Some(Value::Null) if is_break => None,
        None | Some(Value::Null) => return Err(malformed("missing duration")),
        Some(v) => Some(positive_minutes(v).ok_or_else(|| {
            (RejectionReason::Malformed, format!("duration {v} is not a positive number of minutes"))
        })?),
    };

    let entry = ScheduleEntry {
        id: str_field(obj, "id"),
        time,
        duration,
        subject: str_field(obj, "subject"),
        topic: str_field(obj, "topic"),
        kind: kind.unwrap_or(EntryKind::Study),
        notes: str_field(obj, "notes"),
        test_date: date_field(obj, "testDate"),
        homework_due_date: date_field(obj, "homeworkDueDate"),
        mode: obj.get("mode").and_then(Value::as_str).map(str::to_string),
        overlap_warning: false,
    };
    Ok(Parsed { raw_type, kind, entry })
}

fn positive_minutes(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n > 0);
    }
    let f = v.as_f64()?;
    (1.0..=f64::from(u32::MAX)).contains(&f).then(|| f.round() as u32)
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn date_field(obj: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
    obj.get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Flag an entry whose span meets a blocked event on its date.
pub(crate) fn flag_overlaps(
    date: NaiveDate,
    entry: &mut ScheduleEntry,
    set: &ConstraintSet,
    ledger: &mut RejectionLedger,
) {
    let (Some((start, end)), Some(time)) = (entry.span_minutes(), entry.time) else {
        return;
    };
    for block in set.event_blocks_on(date) {
        if block.window.intersects(start, end) {
            entry.overlap_warning = true;
            warn!(%date, topic = %entry.topic, event = block.title(), "session overlaps blocked event");
            ledger.overlaps.push(OverlapWarning {
                date,
                topic: entry.topic.clone(),
                time,
                event: block.title().to_string(),
            });
        }
    }
}
