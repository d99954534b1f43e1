//! Mode-dependent session length policy.

use serde::{Deserialize, Serialize};

use crate::model::{DurationMode, EntryKind, StudyMode};

/// Policy bucket controlling session length and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntensityTier {
    ShortTermExam,
    LongTermExam,
    NoExam,
    /// No timetable-wide mode was chosen.
    Balanced,
}

impl IntensityTier {
    pub const ALL: [IntensityTier; 4] = [
        IntensityTier::ShortTermExam,
        IntensityTier::LongTermExam,
        IntensityTier::NoExam,
        IntensityTier::Balanced,
    ];

    pub fn from_mode(mode: Option<StudyMode>) -> Self {
        match mode {
            Some(StudyMode::ShortTermExam) => IntensityTier::ShortTermExam,
            Some(StudyMode::LongTermExam) => IntensityTier::LongTermExam,
            Some(StudyMode::NoExam) => IntensityTier::NoExam,
            None => IntensityTier::Balanced,
        }
    }

    /// Echo value written into each entry's `mode` field.
    pub fn as_str(self) -> &'static str {
        match self {
            IntensityTier::ShortTermExam => "short-term-exam",
            IntensityTier::LongTermExam => "long-term-exam",
            IntensityTier::NoExam => "no-exam",
            IntensityTier::Balanced => "balanced",
        }
    }

    /// How often a topic should come back round.
    pub fn cadence(self) -> &'static str {
        match self {
            IntensityTier::ShortTermExam => "every 2-3 days; daily in the final week before a test",
            IntensityTier::LongTermExam => "every 3-5 days (spaced repetition)",
            IntensityTier::NoExam => "about once a week",
            IntensityTier::Balanced => "every 5-7 days",
        }
    }
}

impl From<StudyMode> for IntensityTier {
    fn from(mode: StudyMode) -> Self {
        IntensityTier::from_mode(Some(mode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBand {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl DurationBand {
    pub const fn new(min: u32, max: u32, default: u32) -> Self {
        Self { min, max, default }
    }

    pub const fn exact(minutes: u32) -> Self {
        Self::new(minutes, minutes, minutes)
    }

    pub fn contains(&self, minutes: u32) -> bool {
        (self.min..=self.max).contains(&minutes)
    }

    pub fn clamp(&self, minutes: u32) -> u32 {
        minutes.clamp(self.min, self.max)
    }
}

/// Duration settings resolved from the user's preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPolicy {
    pub mode: DurationMode,
    pub session_minutes: u32,
    pub break_minutes: u32,
}

impl DurationPolicy {
    pub fn band(&self, kind: EntryKind, tier: IntensityTier) -> DurationBand {
        duration_policy(self, kind, tier)
    }
}

/// Length band for one entry kind under one intensity tier.
///
/// Fixed mode ignores the tier entirely: the user's session and break lengths win.
pub fn duration_policy(policy: &DurationPolicy, kind: EntryKind, tier: IntensityTier) -> DurationBand {
    use IntensityTier::*;

    if policy.mode == DurationMode::Fixed {
        return match kind {
            EntryKind::Break => DurationBand::exact(policy.break_minutes),
            _ => DurationBand::exact(policy.session_minutes),
        };
    }

    match (kind, tier) {
        (EntryKind::Break, ShortTermExam) => DurationBand::new(5, 10, 8),
        (EntryKind::Break, LongTermExam) => DurationBand::new(10, 15, 12),
        (EntryKind::Break, NoExam) => DurationBand::new(15, 20, 18),
        (EntryKind::Break, Balanced) => DurationBand::new(10, 15, 12),

        // Homework length comes from the assignment; this is only the envelope.
        (EntryKind::Homework, _) => DurationBand::new(15, 120, 60),

        (_, ShortTermExam) => DurationBand::new(60, 90, 75),
        (_, LongTermExam) => DurationBand::new(45, 60, 50),
        (EntryKind::Revision, NoExam) => DurationBand::new(15, 25, 20),
        (_, NoExam) => DurationBand::new(30, 45, 35),
        (_, Balanced) => DurationBand::new(45, 60, 50),
    }
}

/// Band for a focus topic (from prior priority analysis).
pub fn focus_band(policy: &DurationPolicy, priority_score: f64) -> DurationBand {
    match policy.mode {
        DurationMode::Fixed => DurationBand::exact(policy.session_minutes),
        DurationMode::Flexible => {
            let default = (45.0 + priority_score.max(0.0) * 5.0).min(90.0).round() as u32;
            DurationBand::new(60, 90, default.max(60))
        }
    }
}
