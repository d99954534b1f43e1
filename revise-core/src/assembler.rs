//! Final ordering and id assignment for a validated schedule.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{Schedule, ScheduleEntry};

/// Sort each day by start time (breaks without a time go last), drop empty
/// days and give every entry a schedule-wide unique id.
pub fn assemble(days: BTreeMap<NaiveDate, Vec<ScheduleEntry>>) -> Schedule {
    let mut schedule = Schedule::new();
    let mut used: HashSet<String> = HashSet::new();

    for (date, mut entries) in days {
        if entries.is_empty() {
            continue;
        }
        sort_day(&mut entries);

        let mut n = 0usize;
        for entry in &mut entries {
            if entry.id.is_empty() || used.contains(&entry.id) {
                let mut id = format!("session-{date}-{n}");
                while used.contains(&id) {
                    n += 1;
                    id = format!("session-{date}-{n}");
                }
                entry.id = id;
                n += 1;
            }
            used.insert(entry.id.clone());
        }
        schedule.0.insert(date, entries);
    }

    debug!(
        days = schedule.0.len(),
        entries = schedule.entry_count(),
        "schedule assembled"
    );
    schedule
}

/// Stable sort by start time; entries without a time keep their relative order at the end.
pub fn sort_day(entries: &mut [ScheduleEntry]) {
    entries.sort_by_key(|e| (e.time.is_none(), e.time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryKind;
    use crate::time::ClockTime;

    fn at(h: u16, m: u16, topic: &str) -> ScheduleEntry {
        ScheduleEntry::new(EntryKind::Practice, topic, ClockTime::from_hm(h, m).unwrap(), 45)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_days_sorted_by_start_and_empty_days_dropped() {
        let mut timeless = at(0, 0, "Break");
        timeless.kind = EntryKind::Break;
        timeless.time = None;

        let mut days = BTreeMap::new();
        days.insert(d(11), vec![at(18, 0, "c"), timeless, at(9, 30, "a"), at(12, 0, "b")]);
        days.insert(d(12), vec![]);

        let schedule = assemble(days);
        assert!(!schedule.0.contains_key(&d(12)));
        let topics: Vec<&str> = schedule.day(d(11)).iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["a", "b", "c", "Break"]);
    }

    #[test]
    fn test_equal_times_keep_input_order() {
        let mut days = BTreeMap::new();
        days.insert(d(11), vec![at(10, 0, "first"), at(9, 0, "early"), at(10, 0, "second")]);
        let schedule = assemble(days);
        let topics: Vec<&str> = schedule.day(d(11)).iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["early", "first", "second"]);
    }

    #[test]
    fn test_ids_are_unique_and_existing_ids_kept() {
        let mut days = BTreeMap::new();
        days.insert(
            d(11),
            vec![at(9, 0, "a").with_id("session-2024-01-11-1"), at(10, 0, "b"), at(11, 0, "c")],
        );
        days.insert(d(12), vec![at(9, 0, "d").with_id("session-2024-01-11-1")]);

        let schedule = assemble(days);
        let ids: Vec<&str> = schedule.entries().map(|(_, e)| e.id.as_str()).collect();
        assert_eq!(ids[0], "session-2024-01-11-1");
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| !id.is_empty()));
    }
}
