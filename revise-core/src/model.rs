//! Planning request and schedule data model.
//!
//! Field names follow the JSON transport shape used by the web client, so a
//! request body deserializes straight into `PlanningRequest` and a `Schedule`
//! serializes to `{ "YYYY-MM-DD": [entry, ...] }`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time::ClockTime;

/// Per-subject study mode; also used as the timetable-wide baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudyMode {
    ShortTermExam,
    LongTermExam,
    #[default]
    NoExam,
}

impl StudyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::ShortTermExam => "short-term-exam",
            StudyMode::LongTermExam => "long-term-exam",
            StudyMode::NoExam => "no-exam",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StudyMode::ShortTermExam => "Short-Term Exam Prep",
            StudyMode::LongTermExam => "Long-Term Exam Prep",
            StudyMode::NoExam => "No Exam Focus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub exam_board: String,
    #[serde(default)]
    pub mode: StudyMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDate {
    pub subject_id: String,
    pub test_date: NaiveDate,
    #[serde(default)]
    pub test_type: String,
}

/// Minutes used when a homework item carries no duration.
pub const DEFAULT_HOMEWORK_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Homework {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    /// Subject label as typed by the user (a subject name, not an id).
    pub subject: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Homework {
    pub fn minutes(&self) -> u32 {
        self.duration.filter(|d| *d > 0).unwrap_or(DEFAULT_HOMEWORK_MINUTES)
    }
}

/// A user commitment. Only ever carves time out of the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BlockedEvent {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationMode {
    Fixed,
    #[default]
    Flexible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTimeSlot {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub enabled: bool,
}

/// School-day carve-outs. Times are kept as raw strings and parsed by the builder
/// so malformed values are reported as input problems, not deserialization panics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchoolHours {
    #[serde(default)]
    pub school_start_time: Option<String>,
    #[serde(default)]
    pub school_end_time: Option<String>,
    #[serde(default)]
    pub study_before_school: Option<bool>,
    #[serde(default)]
    pub study_during_lunch: Option<bool>,
    #[serde(default)]
    pub study_during_free_periods: Option<bool>,
    #[serde(default)]
    pub before_school_start: Option<String>,
    #[serde(default)]
    pub before_school_end: Option<String>,
    #[serde(default)]
    pub lunch_start: Option<String>,
    #[serde(default)]
    pub lunch_end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub daily_study_hours: f32,
    pub day_time_slots: Vec<DayTimeSlot>,
    pub session_duration: u32,
    pub break_duration: u32,
    #[serde(default)]
    pub duration_mode: DurationMode,
    #[serde(default, rename = "aiNotes")]
    pub ai_notes: Option<String>,
    #[serde(flatten)]
    pub school: SchoolHours,
    /// IANA timezone used to place event timestamps on calendar days.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPriority {
    pub topic_name: String,
    pub priority_score: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultTopic {
    pub topic_name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub study_suggestion: String,
}

/// Prior analysis of which topics need the most attention.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicAnalysis {
    #[serde(default)]
    pub priorities: Vec<TopicPriority>,
    #[serde(default)]
    pub difficult_topics: Vec<DifficultTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceWindow {
    /// e.g. "morning", "evening"
    pub label: String,
    /// e.g. "06:00-12:00"
    pub range: String,
    /// 0.0..=1.0
    pub completion_rate: f64,
    /// 0.0..=10.0
    pub avg_difficulty: f64,
}

/// Historical best/worst study windows. Advisory: biases placement, never blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPerformance {
    pub best: PerformanceWindow,
    pub worst: PerformanceWindow,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Raw input to one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    pub subjects: Vec<Subject>,
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub test_dates: Vec<TestDate>,
    pub preferences: Preferences,
    #[serde(default)]
    pub homeworks: Vec<Homework>,
    #[serde(default)]
    pub topic_analysis: Option<TopicAnalysis>,
    #[serde(default)]
    pub ai_notes: Option<String>,
    #[serde(default)]
    pub events: Vec<BlockedEvent>,
    #[serde(default)]
    pub peak_performance: Option<PeakPerformance>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub timetable_mode: Option<StudyMode>,
}

/// Kinds of block that may appear in a persisted schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Study,
    Revision,
    Practice,
    ExamQuestions,
    Homework,
    Break,
}

impl EntryKind {
    pub const ALL: [EntryKind; 6] = [
        EntryKind::Study,
        EntryKind::Revision,
        EntryKind::Practice,
        EntryKind::ExamQuestions,
        EntryKind::Homework,
        EntryKind::Break,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Study => "study",
            EntryKind::Revision => "revision",
            EntryKind::Practice => "practice",
            EntryKind::ExamQuestions => "exam_questions",
            EntryKind::Homework => "homework",
            EntryKind::Break => "break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        EntryKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Topic-backed kinds (everything except homework and break).
    pub fn is_topic_session(self) -> bool {
        !matches!(self, EntryKind::Homework | EntryKind::Break)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Topic every break entry carries.
pub const BREAK_TOPIC: &str = "Break";

/// One block in the persisted calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Absent only on pass-through break entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub subject: String,
    /// Topic name, homework title, or [`BREAK_TOPIC`].
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homework_due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Set when the block intersects a blocked event; kept for UI highlighting.
    #[serde(default, skip_serializing_if = "is_false")]
    pub overlap_warning: bool,
}

impl ScheduleEntry {
    pub fn new(kind: EntryKind, topic: impl Into<String>, time: ClockTime, duration: u32) -> Self {
        Self {
            id: String::new(),
            time: Some(time),
            duration: Some(duration),
            subject: String::new(),
            topic: topic.into(),
            kind,
            notes: String::new(),
            test_date: None,
            homework_due_date: None,
            mode: None,
            overlap_warning: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.homework_due_date = Some(due);
        self
    }

    /// `[start, end)` in minutes since midnight, when both time and duration are known.
    /// The end may run past midnight (> 1440).
    pub fn span_minutes(&self) -> Option<(u32, u32)> {
        let start = u32::from(self.time?.minutes());
        Some((start, start + self.duration?))
    }
}

/// The persisted calendar: date → entries ordered by start time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(pub BTreeMap<NaiveDate, Vec<ScheduleEntry>>);

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn entry_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn day(&self, date: NaiveDate) -> &[ScheduleEntry] {
        self.0.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entries(&self) -> impl Iterator<Item = (NaiveDate, &ScheduleEntry)> {
        self.0
            .iter()
            .flat_map(|(date, entries)| entries.iter().map(move |e| (*date, e)))
    }

    /// Locate an entry by id: (date, index within the day).
    pub fn find(&self, id: &str) -> Option<(NaiveDate, usize)> {
        self.0.iter().find_map(|(date, entries)| {
            entries.iter().position(|e| e.id == id).map(|idx| (*date, idx))
        })
    }
}
