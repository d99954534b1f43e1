use anyhow::{Context, Result};
use revise_core::{BlockedEvent, PlanningRequest, Schedule};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schedule_lock;

pub fn revise_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".revise"))
}

pub fn ensure_revise_home() -> Result<PathBuf> {
    let dir = revise_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Default location for the last generated schedule.
pub fn schedule_path() -> Result<PathBuf> {
    Ok(ensure_revise_home()?.join("schedule.json"))
}

pub fn read_request(path: &Path) -> Result<PlanningRequest> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse planning request {}", path.display()))
}

pub fn read_schedule(path: &Path) -> Result<Schedule> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    // Accept both a bare date map and the `{ "schedule": ... }` envelope.
    let value: serde_json::Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    let inner = match value {
        serde_json::Value::Object(mut obj) if obj.contains_key("schedule") => {
            obj.remove("schedule").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(inner).with_context(|| format!("parse schedule {}", path.display()))
}

/// Write via a sibling temp file and rename, so a reader never sees a half-written schedule.
pub fn write_schedule(path: &Path, schedule: &Schedule) -> Result<()> {
    write_json(path, schedule)
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Replace one event (matched by id) inside a request file. Every other field
/// of the file is written back untouched, including ones this crate ignores.
pub async fn replace_event(path: &Path, event: &BlockedEvent) -> Result<()> {
    let _lock = schedule_lock::acquire(path).await?;
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut doc: Value = serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;

    let slot = doc
        .get_mut("events")
        .and_then(Value::as_array_mut)
        .and_then(|events| {
            events
                .iter_mut()
                .find(|e| e.get("id").and_then(Value::as_str) == Some(event.id.as_str()))
        })
        .with_context(|| format!("no event '{}' in {}", event.id, path.display()))?;
    *slot = serde_json::to_value(event)?;

    write_json(path, &doc)
}

/// Per-process sibling, so two writers never rename each other's partial file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "schedule.json".into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Read, change and write back a schedule while holding its lock, so
/// concurrent `revise` processes apply their changes one after another.
pub async fn update_schedule<T>(
    path: &Path,
    change: impl FnOnce(Schedule) -> Result<(Schedule, T)>,
) -> Result<T> {
    let _lock = schedule_lock::acquire(path).await?;
    let current = read_schedule(path)?;
    let (next, out) = change(current)?;
    write_schedule(path, &next)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use revise_core::{ClockTime, EntryKind, ScheduleEntry};

    #[test]
    fn test_schedule_write_then_read() {
        let dir = std::env::temp_dir().join(format!("revise-state-{}", std::process::id()));
        let path = dir.join("schedule.json");

        let mut s = Schedule::new();
        s.0.insert(
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            vec![ScheduleEntry::new(EntryKind::Practice, "Vectors", ClockTime::from_hm(16, 0).unwrap(), 60)
                .with_id("session-2024-03-12-0")],
        );
        write_schedule(&path, &s).unwrap();
        assert!(!temp_path(&path).exists());
        assert_eq!(read_schedule(&path).unwrap(), s);

        fs::write(&path, r#"{"schedule": {"2024-03-12": []}}"#).unwrap();
        assert_eq!(read_schedule(&path).unwrap().entry_count(), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_moves_are_both_kept() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("schedule.json");
        let day = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        let target = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();

        let mut s = Schedule::new();
        s.0.insert(
            day,
            vec![
                ScheduleEntry::new(EntryKind::Practice, "Vectors", ClockTime::from_hm(16, 0).unwrap(), 60)
                    .with_id("a"),
                ScheduleEntry::new(EntryKind::Revision, "Enzymes", ClockTime::from_hm(18, 0).unwrap(), 45)
                    .with_id("b"),
            ],
        );
        write_schedule(&path, &s).unwrap();

        let moves = ["a", "b"].map(|id| {
            let path = path.clone();
            tokio::spawn(async move {
                update_schedule(&path, |current| {
                    let outcome = revise_core::move_entry(&current, id, target, &[])?;
                    Ok((outcome.schedule, ()))
                })
                .await
            })
        });
        for handle in moves {
            handle.await.unwrap().unwrap();
        }

        let after = read_schedule(&path).unwrap();
        assert!(after.day(day).is_empty());
        assert_eq!(after.day(target).len(), 2);
        assert!(!schedule_lock::lock_path(&path).exists());
    }

    #[tokio::test]
    async fn test_replace_event_keeps_the_rest_of_the_request() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("request.json");
        fs::write(
            &path,
            r#"{"clientVersion": 7, "events": [
                {"id": "ev-1", "title": "Badminton", "start_time": "2024-03-13T17:00:00Z", "end_time": "2024-03-13T18:00:00Z"},
                {"id": "ev-2", "title": "Piano", "start_time": "2024-03-14T16:00:00Z", "end_time": "2024-03-14T16:30:00Z"}
            ]}"#,
        )
        .unwrap();

        let moved = BlockedEvent {
            id: "ev-1".into(),
            title: "Badminton".into(),
            description: None,
            start_time: "2024-03-15T17:00:00Z".parse().unwrap(),
            end_time: "2024-03-15T18:00:00Z".parse().unwrap(),
        };
        replace_event(&path, &moved).await.unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["clientVersion"], 7);
        assert_eq!(doc["events"][0]["start_time"], "2024-03-15T17:00:00Z");
        assert_eq!(doc["events"][1]["title"], "Piano");

        let missing = BlockedEvent { id: "ev-9".into(), ..moved };
        assert!(replace_event(&path, &missing).await.is_err());
    }
}
