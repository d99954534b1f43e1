//! Constraint model builder: normalizes a raw `PlanningRequest` into the
//! windows, blocked intervals and obligations every later phase works from.
//!
//! Everything here is computed exactly once per request. In particular the
//! set of homework that cannot be scheduled is decided here and reused; the
//! validator never re-derives it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::duration::{focus_band, DurationBand, DurationPolicy, IntensityTier};
use crate::error::{Result, ScheduleError};
use crate::identity::{normalize, IdentitySet};
use crate::model::{
    BlockedEvent, DurationMode, EntryKind, PeakPerformance, PlanningRequest, StudyMode, Subject, TestDate,
};
use crate::resources::is_maths;
use crate::time::{self, ClockTime, MINUTES_PER_DAY};

pub const DEFAULT_TIMEZONE: &str = "Europe/London";

pub const MAX_SUBJECTS: usize = 20;
pub const MAX_TOPICS: usize = 500;
pub const MAX_TEST_DATES: usize = 50;

/// Half-open `[start, end)` span of a day in minutes since midnight; `end` may be 1440.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    pub start: u16,
    pub end: u16,
}

impl TimeWindow {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn whole_day() -> Self {
        Self::new(0, MINUTES_PER_DAY)
    }

    pub fn minutes(&self) -> u32 {
        u32::from(self.end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `[start, end)` (in minutes, possibly past midnight) intersects this window.
    pub fn intersects(&self, start: u32, end: u32) -> bool {
        start < u32::from(self.end) && end > u32::from(self.start)
    }

    /// This window minus `cut`, as zero, one or two pieces.
    pub fn subtract(&self, cut: TimeWindow) -> Vec<TimeWindow> {
        if cut.end <= self.start || cut.start >= self.end {
            return vec![*self];
        }
        let mut out = Vec::new();
        if cut.start > self.start {
            out.push(TimeWindow::new(self.start, cut.start));
        }
        if cut.end < self.end {
            out.push(TimeWindow::new(cut.end, self.end));
        }
        out
    }
}

pub(crate) fn fmt_minutes(m: u16) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", fmt_minutes(self.start), fmt_minutes(self.end))
    }
}

impl Serialize for TimeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayWindows {
    pub day: Weekday,
    pub windows: Vec<TimeWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolSlotKind {
    BeforeSchool,
    Lunch,
    FreePeriod,
}

/// School-day window that only admits short homework sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestrictedWindow {
    pub kind: SchoolSlotKind,
    pub window: TimeWindow,
    pub max_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BlockSource {
    Event { title: String },
    TestDay { subject_id: String, test_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedInterval {
    pub date: NaiveDate,
    pub window: TimeWindow,
    #[serde(flatten)]
    pub source: BlockSource,
}

impl BlockedInterval {
    pub fn is_event(&self) -> bool {
        matches!(self.source, BlockSource::Event { .. })
    }

    pub fn title(&self) -> &str {
        match &self.source {
            BlockSource::Event { title } => title,
            BlockSource::TestDay { test_type, .. } => test_type,
        }
    }
}

/// "Topic X needs N sessions of about M minutes before day D".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicObligation {
    pub topic: String,
    pub subject: String,
    pub subject_id: String,
    pub tier: IntensityTier,
    pub target_sessions: u32,
    pub band: DurationBand,
    pub test_date: Option<NaiveDate>,
    /// Last day a session may be placed (day before the test, or window end).
    pub last_day: NaiveDate,
    pub focus: bool,
    pub priority_score: Option<f64>,
    pub suggested_kinds: Vec<EntryKind>,
    /// Peak-performance window label this topic should lean towards.
    pub preferred_window: Option<String>,
}

/// "Homework Y needs `minutes` before `due_date`, never on it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeworkObligation {
    pub title: String,
    pub subject: String,
    pub due_date: NaiveDate,
    pub minutes: u32,
    pub sessions: u32,
    pub ideal_from: NaiveDate,
    pub latest_day: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Due on or before the first day of the window.
    DueBeforeWindow,
    /// Days exist before the due date but none has study time enabled.
    NoEligibleDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedHomework {
    pub title: String,
    pub due_date: NaiveDate,
    pub reason: ExclusionReason,
}

/// The normalized constraint model for one request. Read-only after `build`.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timezone: Tz,
    pub timetable_mode: Option<StudyMode>,
    pub tier: IntensityTier,
    pub subjects: Vec<Subject>,
    pub test_dates: Vec<TestDate>,
    pub events: Vec<BlockedEvent>,
    pub daily_study_hours: f32,
    pub time_windows: Vec<DayWindows>,
    pub restricted_windows: Vec<RestrictedWindow>,
    pub school_hours: Option<TimeWindow>,
    pub blocked: Vec<BlockedInterval>,
    pub topic_obligations: Vec<TopicObligation>,
    pub homework_obligations: Vec<HomeworkObligation>,
    pub excluded_homework: Vec<ExcludedHomework>,
    /// Due dates of every homework supplied, scheduled or not.
    pub homework_due_dates: BTreeSet<NaiveDate>,
    pub duration_policy: DurationPolicy,
    pub identities: IdentitySet,
    pub directives: Vec<String>,
    pub peak: Option<PeakPerformance>,
    enabled_days: HashSet<Weekday>,
}

impl ConstraintSet {
    pub fn build(req: &PlanningRequest) -> Result<Self> {
        let mut issues: Vec<String> = Vec::new();
        check_request_shape(req, &mut issues);

        let tz_name = req
            .preferences
            .timezone
            .as_deref()
            .unwrap_or(DEFAULT_TIMEZONE);
        let timezone = time::parse_timezone(tz_name).unwrap_or_else(|| {
            issues.push(format!("unknown timezone '{tz_name}'"));
            chrono_tz::UTC
        });

        let school_hours = parse_school_hours(req, &mut issues);
        let (time_windows, enabled_days) = build_time_windows(req, school_hours, &mut issues);
        let restricted_windows = build_restricted_windows(req, school_hours, &mut issues);
        let events = dedupe_events(&req.events, &mut issues);

        if !issues.is_empty() {
            return Err(ScheduleError::InputInvalid(issues));
        }

        let prefs = &req.preferences;
        let duration_policy = DurationPolicy {
            mode: prefs.duration_mode,
            session_minutes: prefs.session_duration,
            break_minutes: prefs.break_duration,
        };

        let identities = IdentitySet::build(&req.subjects, &req.topics, &req.homeworks, &events);

        let mut blocked = event_intervals(&events, timezone);
        for td in &req.test_dates {
            blocked.push(BlockedInterval {
                date: td.test_date,
                window: TimeWindow::whole_day(),
                source: BlockSource::TestDay {
                    subject_id: td.subject_id.clone(),
                    test_type: td.test_type.clone(),
                },
            });
        }
        blocked.sort_by(|a, b| (a.date, a.window).cmp(&(b.date, b.window)));

        let directives = [req.ai_notes.as_deref(), prefs.ai_notes.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut set = ConstraintSet {
            start_date: req.start_date,
            end_date: req.end_date,
            timezone,
            timetable_mode: req.timetable_mode,
            tier: IntensityTier::from_mode(req.timetable_mode),
            subjects: req.subjects.clone(),
            test_dates: req.test_dates.clone(),
            events,
            daily_study_hours: prefs.daily_study_hours,
            time_windows,
            restricted_windows,
            school_hours,
            blocked,
            topic_obligations: Vec::new(),
            homework_obligations: Vec::new(),
            excluded_homework: Vec::new(),
            homework_due_dates: req.homeworks.iter().map(|h| h.due_date).collect(),
            duration_policy,
            identities,
            directives,
            peak: req.peak_performance.clone(),
            enabled_days,
        };

        set.topic_obligations = set.build_topic_obligations(req);
        let (homework, excluded) = set.build_homework_obligations(req);
        set.homework_obligations = homework;
        set.excluded_homework = excluded;

        for ex in &set.excluded_homework {
            warn!(title = %ex.title, due = %ex.due_date, reason = ?ex.reason, "homework cannot be scheduled in window");
        }
        debug!(
            topics = set.topic_obligations.len(),
            homework = set.homework_obligations.len(),
            excluded = set.excluded_homework.len(),
            blocked = set.blocked.len(),
            "constraint model built"
        );

        Ok(set)
    }

    /// General study windows for a calendar date.
    pub fn windows_for(&self, date: NaiveDate) -> &[TimeWindow] {
        let day = date.weekday();
        self.time_windows
            .iter()
            .find(|d| d.day == day)
            .map(|d| d.windows.as_slice())
            .unwrap_or(&[])
    }

    /// A day with any usable time: general windows, or homework carve-outs on a school day.
    pub fn is_study_day(&self, date: NaiveDate) -> bool {
        if !self.enabled_days.contains(&date.weekday()) {
            return false;
        }
        !self.windows_for(date).is_empty()
            || (time::is_school_day(date) && !self.restricted_windows.is_empty())
    }

    pub fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn is_test_day(&self, subject_id: &str, date: NaiveDate) -> bool {
        self.test_dates
            .iter()
            .any(|t| t.subject_id == subject_id && t.test_date == date)
    }

    /// Event-backed blocked intervals on `date`.
    pub fn event_blocks_on(&self, date: NaiveDate) -> impl Iterator<Item = &BlockedInterval> {
        self.blocked
            .iter()
            .filter(move |b| b.date == date && b.is_event())
    }

    /// Earliest test on or after the window start for a subject.
    pub fn upcoming_test(&self, subject_id: &str) -> Option<NaiveDate> {
        self.test_dates
            .iter()
            .filter(|t| t.subject_id == subject_id && t.test_date >= self.start_date)
            .map(|t| t.test_date)
            .min()
    }

    fn build_topic_obligations(&self, req: &PlanningRequest) -> Vec<TopicObligation> {
        let analysis = req.topic_analysis.clone().unwrap_or_default();
        let priorities: HashMap<String, f64> = analysis
            .priorities
            .iter()
            .map(|p| (normalize(&p.topic_name), p.priority_score))
            .collect();
        let difficult: HashSet<String> = analysis
            .difficult_topics
            .iter()
            .map(|d| normalize(&d.topic_name))
            .collect();

        let mut seen_subjects: HashSet<&str> = HashSet::new();
        let mut seen_topics: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for topic in &req.topics {
            let key = normalize(&topic.name);
            if !seen_topics.insert(key.clone()) {
                continue;
            }
            // Subject ids were checked in `check_request_shape`.
            let Some(subject) = self.subject(&topic.subject_id) else {
                continue;
            };
            let tier = IntensityTier::from(subject.mode);
            let first_of_subject = seen_subjects.insert(subject.id.as_str());

            let base = match subject.mode {
                StudyMode::ShortTermExam | StudyMode::LongTermExam => 2,
                StudyMode::NoExam => 1,
            };

            let test_date = self.upcoming_test(&subject.id);
            let test_target = test_date.map(|d| {
                let days_until = (d - self.start_date).num_days();
                let boost = if days_until <= 7 {
                    3
                } else if days_until <= 28 {
                    2
                } else {
                    1
                };
                base + boost
            });

            let priority_score = priorities.get(&key).copied();
            let priority_target = priority_score.map(|s| 4u32.max((s / 1.5).ceil().max(0.0) as u32));
            let is_difficult = difficult.contains(&key);
            let difficult_target = is_difficult.then_some(3);

            // Max, never sum: overlapping boosts must not stack.
            let mut target_sessions = [Some(base), test_target, priority_target, difficult_target]
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(base);

            let mut band = self.duration_policy.band(EntryKind::Practice, tier);
            if test_target.is_some() {
                band = larger(
                    band,
                    self.duration_policy
                        .band(EntryKind::Practice, IntensityTier::ShortTermExam),
                );
            }
            if let Some(score) = priority_score {
                band = larger(band, focus_band(&self.duration_policy, score));
            } else if is_difficult {
                band = larger(band, focus_band(&self.duration_policy, 6.0));
            }

            let last_day = match test_date {
                Some(d) => (d - Duration::days(1)).min(self.end_date),
                None => self.end_date,
            };
            if last_day < self.start_date {
                target_sessions = 0;
            }

            let suggested_kinds = if first_of_subject && !is_maths(&subject.name) {
                vec![EntryKind::Revision, EntryKind::ExamQuestions]
            } else {
                vec![EntryKind::Practice, EntryKind::ExamQuestions]
            };

            let focus = priority_score.is_some();
            let preferred_window = self.peak.as_ref().and_then(|peak| {
                let hard = is_difficult || priority_score.is_some_and(|s| s >= 7.0);
                let easy = priority_score.is_some_and(|s| s <= 4.0);
                if hard {
                    Some(peak.best.label.clone())
                } else if easy {
                    Some(peak.worst.label.clone())
                } else {
                    None
                }
            });

            out.push(TopicObligation {
                topic: topic.name.trim().to_string(),
                subject: subject.name.clone(),
                subject_id: subject.id.clone(),
                tier,
                target_sessions,
                band,
                test_date,
                last_day,
                focus,
                priority_score,
                suggested_kinds,
                preferred_window,
            });
        }

        out
    }

    fn build_homework_obligations(
        &self,
        req: &PlanningRequest,
    ) -> (Vec<HomeworkObligation>, Vec<ExcludedHomework>) {
        let mut obligations = Vec::new();
        let mut excluded = Vec::new();

        for hw in &req.homeworks {
            let latest_day = (hw.due_date - Duration::days(1)).min(self.end_date);
            if latest_day < self.start_date {
                excluded.push(ExcludedHomework {
                    title: hw.title.trim().to_string(),
                    due_date: hw.due_date,
                    reason: ExclusionReason::DueBeforeWindow,
                });
                continue;
            }
            if !time::days_inclusive(self.start_date, latest_day).any(|d| self.is_study_day(d)) {
                excluded.push(ExcludedHomework {
                    title: hw.title.trim().to_string(),
                    due_date: hw.due_date,
                    reason: ExclusionReason::NoEligibleDay,
                });
                continue;
            }

            let minutes = hw.minutes();
            let sessions = match self.duration_policy.mode {
                DurationMode::Fixed => {
                    minutes.div_ceil(self.duration_policy.session_minutes.max(1))
                }
                DurationMode::Flexible => minutes.div_ceil(120),
            }
            .max(1);

            obligations.push(HomeworkObligation {
                title: hw.title.trim().to_string(),
                subject: hw.subject.clone(),
                due_date: hw.due_date,
                minutes,
                sessions,
                ideal_from: (hw.due_date - Duration::days(3)).max(self.start_date),
                latest_day,
            });
        }

        // Sooner deadlines first.
        obligations.sort_by(|a, b| (a.due_date, &a.title).cmp(&(b.due_date, &b.title)));
        (obligations, excluded)
    }
}

fn larger(a: DurationBand, b: DurationBand) -> DurationBand {
    if b.default > a.default { b } else { a }
}

fn check_request_shape(req: &PlanningRequest, issues: &mut Vec<String>) {
    if req.start_date > req.end_date {
        issues.push(format!(
            "startDate {} is after endDate {}",
            req.start_date, req.end_date
        ));
    }
    if req.subjects.len() > MAX_SUBJECTS {
        issues.push(format!("too many subjects ({} > {MAX_SUBJECTS})", req.subjects.len()));
    }
    if req.topics.len() > MAX_TOPICS {
        issues.push(format!("too many topics ({} > {MAX_TOPICS})", req.topics.len()));
    }
    if req.test_dates.len() > MAX_TEST_DATES {
        issues.push(format!(
            "too many test dates ({} > {MAX_TEST_DATES})",
            req.test_dates.len()
        ));
    }

    let prefs = &req.preferences;
    if !(0.0..=12.0).contains(&prefs.daily_study_hours) {
        issues.push(format!(
            "daily_study_hours must be within 0-12 (got {})",
            prefs.daily_study_hours
        ));
    }
    if !(15..=180).contains(&prefs.session_duration) {
        issues.push(format!(
            "session_duration must be within 15-180 minutes (got {})",
            prefs.session_duration
        ));
    }
    if !(5..=60).contains(&prefs.break_duration) {
        issues.push(format!(
            "break_duration must be within 5-60 minutes (got {})",
            prefs.break_duration
        ));
    }

    let mut subject_ids = HashSet::new();
    for s in &req.subjects {
        if !subject_ids.insert(s.id.as_str()) {
            issues.push(format!("duplicate subject id '{}'", s.id));
        }
        if s.name.trim().is_empty() {
            issues.push(format!("subject '{}' has an empty name", s.id));
        }
    }
    let mut topic_names: HashMap<String, usize> = HashMap::new();
    for (idx, t) in req.topics.iter().enumerate() {
        if t.name.trim().is_empty() {
            issues.push(format!("topics[{idx}]: name must be non-empty"));
        } else if let Some(first) = topic_names.insert(normalize(&t.name), idx) {
            issues.push(format!(
                "topics[{idx}] '{}': name duplicates topics[{first}]",
                t.name
            ));
        }
        if !subject_ids.contains(t.subject_id.as_str()) {
            issues.push(format!(
                "topics[{idx}] '{}': unknown subject_id '{}'",
                t.name, t.subject_id
            ));
        }
    }
    for (idx, td) in req.test_dates.iter().enumerate() {
        if !subject_ids.contains(td.subject_id.as_str()) {
            issues.push(format!(
                "testDates[{idx}]: unknown subject_id '{}'",
                td.subject_id
            ));
        }
    }
    for (idx, hw) in req.homeworks.iter().enumerate() {
        if hw.title.trim().is_empty() {
            issues.push(format!("homeworks[{idx}]: title must be non-empty"));
        }
    }
}

fn parse_clock(label: &str, value: &str, issues: &mut Vec<String>) -> Option<ClockTime> {
    match value.parse::<ClockTime>() {
        Ok(t) => Some(t),
        Err(e) => {
            issues.push(format!("{label}: {e}"));
            None
        }
    }
}

/// Like `parse_clock` but accepts "24:00" as the end of the day.
fn parse_window_end(label: &str, value: &str, issues: &mut Vec<String>) -> Option<u16> {
    if value.trim() == "24:00" {
        return Some(MINUTES_PER_DAY);
    }
    parse_clock(label, value, issues).map(ClockTime::minutes)
}

fn parse_school_hours(req: &PlanningRequest, issues: &mut Vec<String>) -> Option<TimeWindow> {
    let school = &req.preferences.school;
    let (Some(start), Some(end)) = (
        school.school_start_time.as_deref(),
        school.school_end_time.as_deref(),
    ) else {
        return None;
    };
    let start = parse_clock("school_start_time", start, issues)?;
    let end = parse_clock("school_end_time", end, issues)?;
    if start >= end {
        issues.push(format!("school hours {start}-{end} are empty"));
        return None;
    }
    Some(TimeWindow::new(start.minutes(), end.minutes()))
}

fn build_time_windows(
    req: &PlanningRequest,
    school: Option<TimeWindow>,
    issues: &mut Vec<String>,
) -> (Vec<DayWindows>, HashSet<Weekday>) {
    let mut by_day: Vec<DayWindows> = Vec::new();
    let mut enabled = HashSet::new();

    for (idx, slot) in req.preferences.day_time_slots.iter().enumerate() {
        let Some(day) = time::parse_weekday(&slot.day) else {
            issues.push(format!("day_time_slots[{idx}]: unknown day '{}'", slot.day));
            continue;
        };
        if !slot.enabled {
            continue;
        }
        let label = format!("day_time_slots[{idx}] ({})", slot.day);
        let (Some(start), Some(end)) = (
            parse_clock(&label, &slot.start_time, issues),
            parse_window_end(&label, &slot.end_time, issues),
        ) else {
            continue;
        };
        if start.minutes() >= end {
            issues.push(format!("{label}: start must be before end"));
            continue;
        }
        enabled.insert(day);

        let mut pieces = vec![TimeWindow::new(start.minutes(), end)];
        // On school days nothing but carve-out homework may happen before school ends.
        if let Some(school) = school {
            if !matches!(day, Weekday::Sat | Weekday::Sun) {
                let cut = TimeWindow::new(0, school.end);
                pieces = pieces.into_iter().flat_map(|w| w.subtract(cut)).collect();
            }
        }

        match by_day.iter_mut().find(|d| d.day == day) {
            Some(existing) => existing.windows.extend(pieces),
            None => by_day.push(DayWindows { day, windows: pieces }),
        }
    }

    for d in &mut by_day {
        d.windows.sort();
        d.windows = merge_windows(&d.windows);
    }
    by_day.retain(|d| !d.windows.is_empty() || enabled.contains(&d.day));
    by_day.sort_by_key(|d| d.day.num_days_from_monday());
    (by_day, enabled)
}

fn merge_windows(sorted: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut out: Vec<TimeWindow> = Vec::new();
    for w in sorted.iter().filter(|w| !w.is_empty()) {
        match out.last_mut() {
            Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
            _ => out.push(*w),
        }
    }
    out
}

fn build_restricted_windows(
    req: &PlanningRequest,
    school: Option<TimeWindow>,
    issues: &mut Vec<String>,
) -> Vec<RestrictedWindow> {
    let Some(school) = school else {
        return Vec::new();
    };
    let s = &req.preferences.school;
    let mut out = Vec::new();

    let mut carve = |enabled: Option<bool>,
                     kind: SchoolSlotKind,
                     start: Option<&str>,
                     end: Option<&str>,
                     max_minutes: u32,
                     issues: &mut Vec<String>| {
        if enabled != Some(true) {
            return;
        }
        let (Some(start), Some(end)) = (start, end) else {
            warn!(?kind, "school carve-out enabled without times; ignoring");
            return;
        };
        let label = format!("{kind:?} window");
        if let (Some(a), Some(b)) = (
            parse_clock(&label, start, issues),
            parse_clock(&label, end, issues),
        ) {
            if a < b {
                out.push(RestrictedWindow {
                    kind,
                    window: TimeWindow::new(a.minutes(), b.minutes()),
                    max_minutes,
                });
            } else {
                issues.push(format!("{label}: start must be before end"));
            }
        }
    };

    carve(
        s.study_before_school,
        SchoolSlotKind::BeforeSchool,
        s.before_school_start.as_deref(),
        s.before_school_end.as_deref(),
        25,
        issues,
    );
    carve(
        s.study_during_lunch,
        SchoolSlotKind::Lunch,
        s.lunch_start.as_deref(),
        s.lunch_end.as_deref(),
        20,
        issues,
    );
    if s.study_during_free_periods == Some(true) {
        out.push(RestrictedWindow {
            kind: SchoolSlotKind::FreePeriod,
            window: school,
            max_minutes: 25,
        });
    }
    out
}

/// Drop exact duplicates (same id, title and times) and reject inverted events.
fn dedupe_events(events: &[BlockedEvent], issues: &mut Vec<String>) -> Vec<BlockedEvent> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (idx, e) in events.iter().enumerate() {
        if e.end_time < e.start_time {
            issues.push(format!("events[{idx}] '{}': end_time is before start_time", e.title));
            continue;
        }
        let key = (e.id.clone(), e.title.clone(), e.start_time, e.end_time);
        if seen.insert(key) {
            out.push(e.clone());
        }
    }
    out
}

/// Localize events and split any that cross midnight into per-day intervals.
fn event_intervals(events: &[BlockedEvent], tz: Tz) -> Vec<BlockedInterval> {
    let mut out = Vec::new();
    for e in events {
        let start = time::localize(e.start_time, tz);
        let end = time::localize(e.end_time, tz);
        for date in time::days_inclusive(start.date(), end.date()) {
            let from = if date == start.date() { time::minute_of_day(&start) } else { 0 };
            let to = if date == end.date() { time::minute_of_day(&end) } else { MINUTES_PER_DAY };
            let window = TimeWindow::new(from, to);
            if window.is_empty() {
                continue;
            }
            out.push(BlockedInterval {
                date,
                window,
                source: BlockSource::Event { title: e.title.clone() },
            });
        }
    }
    out
}
