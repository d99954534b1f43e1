//! Context compiler: turns a `ConstraintSet` into the generation brief handed
//! to candidate acquisition.
//!
//! The brief is the whole contract with the candidate producer. It lists the
//! only titles that may appear, the only windows that may be used, and the
//! intervals that must stay empty. Compiling is pure; the same constraint set
//! always yields the same brief and the same rendered prompt.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::constraints::{
    BlockedInterval, ConstraintSet, DayWindows, ExcludedHomework, HomeworkObligation,
    RestrictedWindow, SchoolSlotKind,
};
use crate::duration::{DurationBand, IntensityTier};
use crate::model::{DurationMode, EntryKind};
use crate::resources::{resource_hint, resources_for};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyRow {
    pub tier: IntensityTier,
    pub kind: EntryKind,
    pub band: DurationBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityDirective {
    pub tier: IntensityTier,
    pub session: DurationBand,
    pub break_band: DurationBand,
    pub cadence: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDay {
    pub date: NaiveDate,
    pub subject: String,
    pub test_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicDirective {
    pub topic: String,
    pub subject: String,
    pub target_sessions: u32,
    pub band: DurationBand,
    pub last_day: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_date: Option<NaiveDate>,
    pub focus: bool,
    pub kinds: Vec<EntryKind>,
    pub resources: Vec<&'static str>,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_window: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakDirective {
    pub best: String,
    pub worst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationBrief {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timezone: String,
    pub mode: &'static str,
    pub duration_mode: DurationMode,
    pub daily_study_minutes: u32,
    /// Closed list: the only topic titles a candidate may use.
    pub topics: Vec<String>,
    /// Closed list: the only homework titles a candidate may use.
    pub homework: Vec<String>,
    /// Event titles; never valid as an entry title.
    pub forbidden_titles: Vec<String>,
    pub duration_policy: Vec<PolicyRow>,
    pub intensity: Vec<IntensityDirective>,
    pub time_windows: Vec<DayWindows>,
    pub restricted_windows: Vec<RestrictedWindow>,
    /// For exclusion only.
    pub blocked: Vec<BlockedInterval>,
    pub test_days: Vec<TestDay>,
    pub topic_plan: Vec<TopicDirective>,
    pub homework_plan: Vec<HomeworkObligation>,
    pub excluded_homework: Vec<ExcludedHomework>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak: Option<PeakDirective>,
    pub notes: Vec<String>,
}

impl GenerationBrief {
    pub fn compile(set: &ConstraintSet) -> Self {
        let mut tiers: BTreeSet<IntensityTier> = set
            .subjects
            .iter()
            .map(|s| IntensityTier::from(s.mode))
            .collect();
        tiers.insert(set.tier);

        let duration_policy = tiers
            .iter()
            .flat_map(|&tier| {
                EntryKind::ALL.into_iter().map(move |kind| PolicyRow {
                    tier,
                    kind,
                    band: set.duration_policy.band(kind, tier),
                })
            })
            .collect();

        let intensity = tiers
            .iter()
            .map(|&tier| IntensityDirective {
                tier,
                session: set.duration_policy.band(EntryKind::Practice, tier),
                break_band: set.duration_policy.band(EntryKind::Break, tier),
                cadence: tier.cadence(),
            })
            .collect();

        let mut test_days: Vec<TestDay> = set
            .test_dates
            .iter()
            .filter(|t| set.in_window(t.test_date))
            .map(|t| TestDay {
                date: t.test_date,
                subject: set
                    .subject(&t.subject_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| t.subject_id.clone()),
                test_type: t.test_type.clone(),
            })
            .collect();
        test_days.sort_by(|a, b| (a.date, &a.subject).cmp(&(b.date, &b.subject)));

        let topic_plan = set
            .topic_obligations
            .iter()
            .filter(|o| o.target_sessions > 0)
            .map(|o| {
                let lead = o.suggested_kinds.first().copied().unwrap_or(EntryKind::Practice);
                TopicDirective {
                    topic: o.topic.clone(),
                    subject: o.subject.clone(),
                    target_sessions: o.target_sessions,
                    band: o.band,
                    last_day: o.last_day,
                    test_date: o.test_date,
                    focus: o.focus,
                    kinds: o.suggested_kinds.clone(),
                    resources: resources_for(lead, &o.subject),
                    hint: resource_hint(lead, &o.subject, &o.topic),
                    preferred_window: o.preferred_window.clone(),
                }
            })
            .collect();

        let peak = set.peak.as_ref().map(|p| PeakDirective {
            best: format!("{} ({})", p.best.label, p.best.range),
            worst: format!("{} ({})", p.worst.label, p.worst.range),
            recommendation: p.recommendation.clone(),
        });

        GenerationBrief {
            start_date: set.start_date,
            end_date: set.end_date,
            timezone: set.timezone.name().to_string(),
            mode: set.tier.as_str(),
            duration_mode: set.duration_policy.mode,
            daily_study_minutes: (set.daily_study_hours * 60.0).round() as u32,
            topics: set.identities.topic_names(),
            homework: set.identities.homework_titles(),
            forbidden_titles: set.identities.event_titles(),
            duration_policy,
            intensity,
            time_windows: set.time_windows.clone(),
            restricted_windows: set.restricted_windows.clone(),
            blocked: set.blocked.iter().filter(|b| b.is_event()).cloned().collect(),
            test_days,
            topic_plan,
            homework_plan: set.homework_obligations.clone(),
            excluded_homework: set.excluded_homework.clone(),
            peak,
            notes: set.directives.clone(),
        }
    }

    /// Instruction text for a text-in/text-out generator.
    pub fn render_prompt(&self) -> String {
        self.to_string()
    }
}

fn band(b: &DurationBand) -> String {
    if b.min == b.max {
        format!("{} min", b.min)
    } else {
        format!("{}-{} min (aim for {})", b.min, b.max, b.default)
    }
}

fn slot_label(kind: SchoolSlotKind) -> &'static str {
    match kind {
        SchoolSlotKind::BeforeSchool => "before school",
        SchoolSlotKind::Lunch => "lunch",
        SchoolSlotKind::FreePeriod => "free periods",
    }
}

impl fmt::Display for GenerationBrief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Build a revision timetable from {} to {} (timezone {}).",
            self.start_date, self.end_date, self.timezone
        )?;
        writeln!(
            f,
            "Timetable mode: {}. Duration mode: {:?}. Daily study target: about {} minutes.",
            self.mode, self.duration_mode, self.daily_study_minutes
        )?;

        writeln!(f, "\nVALID TOPICS (use these exact strings, no others):")?;
        for t in &self.topics {
            writeln!(f, "- {t}")?;
        }
        writeln!(f, "\nVALID HOMEWORK (use these exact strings, no others):")?;
        if self.homework.is_empty() {
            writeln!(f, "- none")?;
        }
        for h in &self.homework {
            writeln!(f, "- {h}")?;
        }
        if !self.forbidden_titles.is_empty() {
            writeln!(f, "\nFORBIDDEN TITLES (these are the student's events, never sessions):")?;
            for t in &self.forbidden_titles {
                writeln!(f, "- {t}")?;
            }
        }

        writeln!(f, "\nAVAILABLE TIME:")?;
        for d in &self.time_windows {
            let windows: Vec<String> = d.windows.iter().map(ToString::to_string).collect();
            writeln!(f, "- {:?}: {}", d.day, windows.join(", "))?;
        }
        for r in &self.restricted_windows {
            writeln!(
                f,
                "- school days, {} {}: homework only, at most {} min",
                slot_label(r.kind),
                r.window,
                r.max_minutes
            )?;
        }

        if !self.blocked.is_empty() {
            writeln!(f, "\nBLOCKED (schedule nothing that overlaps these):")?;
            for b in &self.blocked {
                writeln!(f, "- {} {} {}", b.date, b.window, b.title())?;
            }
        }
        if !self.test_days.is_empty() {
            writeln!(f, "\nTEST DAYS (no sessions for that subject on the day):")?;
            for t in &self.test_days {
                writeln!(f, "- {} {} {}", t.date, t.subject, t.test_type)?;
            }
        }

        writeln!(f, "\nINTENSITY:")?;
        for i in &self.intensity {
            writeln!(
                f,
                "- {}: sessions {}, breaks {}, revisit topics {}",
                i.tier.as_str(),
                band(&i.session),
                band(&i.break_band),
                i.cadence
            )?;
        }

        writeln!(f, "\nTOPIC PLAN:")?;
        for t in &self.topic_plan {
            let kinds: Vec<&str> = t.kinds.iter().map(|k| k.as_str()).collect();
            write!(
                f,
                "- {} ({}): {} sessions of {}, types {}, by {}",
                t.topic,
                t.subject,
                t.target_sessions,
                band(&t.band),
                kinds.join(" then "),
                t.last_day
            )?;
            if t.focus {
                write!(f, ", FOCUS")?;
            }
            if let Some(w) = &t.preferred_window {
                write!(f, ", prefer {w}")?;
            }
            writeln!(f, ". Note: {}", t.hint)?;
        }

        if !self.homework_plan.is_empty() {
            writeln!(f, "\nHOMEWORK (finish before the due date, never on it):")?;
            for h in &self.homework_plan {
                writeln!(
                    f,
                    "- {} ({}): {} min in {} block(s), ideally from {}, latest {}, due {}",
                    h.title, h.subject, h.minutes, h.sessions, h.ideal_from, h.latest_day, h.due_date
                )?;
            }
        }

        if let Some(p) = &self.peak {
            writeln!(
                f,
                "\nPEAK PERFORMANCE: hardest work in {}, lighter review in {}.",
                p.best, p.worst
            )?;
            if let Some(r) = &p.recommendation {
                writeln!(f, "{r}")?;
            }
        }
        if !self.notes.is_empty() {
            writeln!(f, "\nSTUDENT NOTES:")?;
            for n in &self.notes {
                writeln!(f, "- {n}")?;
            }
        }

        let types: Vec<&str> = EntryKind::ALL.iter().map(|k| k.as_str()).collect();
        writeln!(f, "\nOUTPUT: return only a JSON object:")?;
        writeln!(
            f,
            "{{\"schedule\": {{\"YYYY-MM-DD\": [{{\"time\": \"HH:MM\", \"duration\": 45, \"subject\": \"...\", \"topic\": \"...\", \"type\": \"...\", \"notes\": \"...\", \"testDate\": \"YYYY-MM-DD\", \"homeworkDueDate\": \"YYYY-MM-DD\", \"mode\": \"{}\"}}]}}}}",
            self.mode
        )?;
        write!(f, "Allowed types: {}.", types.join(", "))
    }
}
