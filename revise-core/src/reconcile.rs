//! Drag-move reconciliation on an already-persisted schedule.
//!
//! A move is remove-then-insert on a copy of the schedule, so a failed move
//! leaves the caller's schedule untouched. Constraint problems at the target
//! are reported as warnings; the move itself always goes through.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::assembler::sort_day;
use crate::constraints::{BlockedInterval, TimeWindow};
use crate::error::MoveError;
use crate::model::{BlockedEvent, Schedule, ScheduleEntry};
use crate::time;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum MoveWarning {
    /// Homework placed on or after its due date.
    PastDueDate { title: String, due: NaiveDate },
    /// Entry now intersects a blocked interval.
    Overlap { blocked: String, window: TimeWindow },
}

impl fmt::Display for MoveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveWarning::PastDueDate { title, due } => {
                write!(f, "'{title}' is due {due}; it is now scheduled on or after its deadline")
            }
            MoveWarning::Overlap { blocked, window } => {
                write!(f, "overlaps '{blocked}' ({window})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub schedule: Schedule,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub warnings: Vec<MoveWarning>,
}

/// Move one entry to `target`, keeping its clock time and duration.
pub fn move_entry(
    schedule: &Schedule,
    entry_id: &str,
    target: NaiveDate,
    blocked: &[BlockedInterval],
) -> Result<MoveOutcome, MoveError> {
    let (from, idx) = schedule
        .find(entry_id)
        .ok_or_else(|| MoveError::NotFound(entry_id.to_string()))?;

    let mut next = schedule.clone();
    let Some(source) = next.0.get_mut(&from) else {
        return Err(MoveError::NotFound(entry_id.to_string()));
    };
    let mut entry = source.remove(idx);
    if source.is_empty() {
        next.0.remove(&from);
    }

    let mut warnings = Vec::new();
    if let Some(due) = entry.homework_due_date {
        if target >= due {
            warnings.push(MoveWarning::PastDueDate {
                title: entry.topic.clone(),
                due,
            });
        }
    }

    entry.overlap_warning = false;
    if let Some((start, end)) = entry.span_minutes() {
        for b in blocked
            .iter()
            .filter(|b| b.date == target && b.is_event())
        {
            if b.window.intersects(start, end) {
                entry.overlap_warning = true;
                warnings.push(MoveWarning::Overlap {
                    blocked: b.title().to_string(),
                    window: b.window,
                });
            }
        }
    }

    for w in &warnings {
        warn!(entry = entry_id, %target, "{w}");
    }

    insert_in_order(next.0.entry(target).or_default(), entry);
    info!(entry = entry_id, %from, to = %target, warnings = warnings.len(), "entry moved");

    Ok(MoveOutcome {
        schedule: next,
        from,
        to: target,
        warnings,
    })
}

fn insert_in_order(day: &mut Vec<ScheduleEntry>, entry: ScheduleEntry) {
    let key = (entry.time.is_none(), entry.time);
    let pos = day.partition_point(|e| (e.time.is_none(), e.time) <= key);
    day.insert(pos, entry);
}

/// Move a blocked event to `target`, keeping its local clock time and length.
pub fn move_event(event: &BlockedEvent, target: NaiveDate, tz: Tz) -> Result<BlockedEvent, MoveError> {
    let local_start = time::localize(event.start_time, tz);
    let length = event.end_time - event.start_time;

    let start = time::local_to_utc(target, local_start.time(), tz).ok_or_else(|| {
        MoveError::InvalidLocalTime {
            date: target.to_string(),
            time: local_start.time().format("%H:%M").to_string(),
            tz: tz.name().to_string(),
        }
    })?;

    Ok(BlockedEvent {
        start_time: start,
        end_time: start + length,
        ..event.clone()
    })
}

/// A schedule that serializes concurrent moves: each move sees the result of
/// every move that finished before it.
#[derive(Debug, Default)]
pub struct SharedSchedule {
    inner: Mutex<Schedule>,
}

impl SharedSchedule {
    pub fn new(schedule: Schedule) -> Self {
        Self { inner: Mutex::new(schedule) }
    }

    pub fn snapshot(&self) -> Schedule {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn move_entry(
        &self,
        entry_id: &str,
        target: NaiveDate,
        blocked: &[BlockedInterval],
    ) -> Result<Vec<MoveWarning>, MoveError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = move_entry(&guard, entry_id, target, blocked)?;
        *guard = outcome.schedule;
        Ok(outcome.warnings)
    }

    pub fn into_inner(self) -> Schedule {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Re-sort every day; used after bulk edits loaded from disk.
pub fn normalize_order(schedule: &mut Schedule) {
    for day in schedule.0.values_mut() {
        sort_day(day);
    }
    schedule.0.retain(|_, entries| !entries.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::BlockSource;
    use crate::model::EntryKind;
    use crate::time::ClockTime;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn entry(id: &str, h: u16, kind: EntryKind) -> ScheduleEntry {
        ScheduleEntry::new(kind, format!("topic {id}"), ClockTime::from_hm(h, 0).unwrap(), 60).with_id(id)
    }

    fn schedule() -> Schedule {
        let mut s = Schedule::new();
        s.0.insert(d(1, 11), vec![entry("a", 10, EntryKind::Practice)]);
        s.0.insert(
            d(1, 12),
            vec![entry("b", 9, EntryKind::Revision), entry("c", 17, EntryKind::Practice)],
        );
        s
    }

    fn badminton(date: NaiveDate) -> BlockedInterval {
        BlockedInterval {
            date,
            window: TimeWindow::new(9 * 60 + 30, 11 * 60),
            source: BlockSource::Event { title: "Badminton".into() },
        }
    }

    #[test]
    fn test_move_removes_emptied_source_and_keeps_time_order() {
        let before = schedule();
        let out = move_entry(&before, "a", d(1, 12), &[]).unwrap();

        assert!(!out.schedule.0.contains_key(&d(1, 11)));
        let ids: Vec<&str> = out.schedule.day(d(1, 12)).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(out.schedule.entry_count(), before.entry_count());
        assert_eq!(out.schedule.day(d(1, 12))[1].time, ClockTime::from_hm(10, 0));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_moved_entry_appears_exactly_once_and_others_untouched() {
        let before = schedule();
        let out = move_entry(&before, "b", d(1, 20), &[]).unwrap();
        let count = out.schedule.entries().filter(|(_, e)| e.id == "b").count();
        assert_eq!(count, 1);
        assert_eq!(out.schedule.find("b"), Some((d(1, 20), 0)));
        for id in ["a", "c"] {
            assert_eq!(out.schedule.find(id), before.find(id).map(|(date, _)| (date, 0)));
        }
    }

    #[test]
    fn test_unknown_id_is_not_found_and_schedule_unchanged() {
        let shared = SharedSchedule::new(schedule());
        let err = shared.move_entry("gone", d(1, 13), &[]).unwrap_err();
        assert_eq!(err, MoveError::NotFound("gone".into()));
        assert_eq!(shared.snapshot(), schedule());
    }

    #[test]
    fn test_homework_moved_past_due_date_warns() {
        let mut s = Schedule::new();
        s.0.insert(
            d(1, 13),
            vec![entry("hw", 16, EntryKind::Homework).with_due_date(d(1, 15))],
        );
        let out = move_entry(&s, "hw", d(1, 15), &[]).unwrap();
        assert!(matches!(out.warnings[0], MoveWarning::PastDueDate { due, .. } if due == d(1, 15)));
        assert_eq!(out.schedule.find("hw"), Some((d(1, 15), 0)));

        let ok = move_entry(&s, "hw", d(1, 14), &[]).unwrap();
        assert!(ok.warnings.is_empty());
    }

    #[test]
    fn test_overlap_flag_recomputed_at_target() {
        let blocked = [badminton(d(1, 12))];
        let out = move_entry(&schedule(), "a", d(1, 12), &blocked).unwrap();
        let moved = &out.schedule.day(d(1, 12))[1];
        assert!(moved.overlap_warning);
        assert!(matches!(out.warnings[0], MoveWarning::Overlap { .. }));

        let back = move_entry(&out.schedule, "a", d(1, 11), &blocked).unwrap();
        assert!(!back.schedule.day(d(1, 11))[0].overlap_warning);
    }

    #[test]
    fn test_move_event_keeps_local_clock_time_across_dst() {
        let ev = BlockedEvent {
            id: "e".into(),
            title: "Piano".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 1, 10, 19, 30, 0).unwrap(),
        };
        let moved = move_event(&ev, d(4, 10), chrono_tz::Europe::London).unwrap();
        assert_eq!(moved.start_time, Utc.with_ymd_and_hms(2024, 4, 10, 17, 0, 0).unwrap());
        assert_eq!(moved.duration_minutes(), 90);
        assert_eq!(moved.title, "Piano");
    }

    #[test]
    fn test_move_event_into_spring_forward_gap_fails() {
        let ev = BlockedEvent {
            id: "e".into(),
            title: "Night shift".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2024, 3, 24, 1, 30, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 24, 2, 0, 0).unwrap(),
        };
        let err = move_event(&ev, d(3, 31), chrono_tz::Europe::London).unwrap_err();
        assert!(matches!(err, MoveError::InvalidLocalTime { .. }));
    }

    #[test]
    fn test_concurrent_moves_serialize() {
        let mut s = Schedule::new();
        s.0.insert(
            d(1, 11),
            (0..8).map(|i| entry(&format!("e{i}"), 8 + i, EntryKind::Practice)).collect(),
        );
        let shared = Arc::new(SharedSchedule::new(s));

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    shared.move_entry(&format!("e{i}"), d(1, 12 + i % 2), &[]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let after = shared.snapshot();
        assert_eq!(after.entry_count(), 8);
        assert!(!after.0.contains_key(&d(1, 11)));
        for i in 0..8 {
            assert_eq!(after.entries().filter(|(_, e)| e.id == format!("e{i}")).count(), 1);
        }
        for day in after.0.values() {
            assert!(day.windows(2).all(|w| w[0].time <= w[1].time));
        }
    }
}
