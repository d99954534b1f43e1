//! Recovering a candidate schedule from raw generator output.
//!
//! Generators wrap their JSON in code fences or chatter. We take the fenced
//! body when there is one, otherwise the outermost `{ ... }`, and require the
//! result to be a date map (optionally under a `schedule` key).

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, ScheduleError};

const MIN_PAYLOAD_LEN: usize = 10;

/// One date key of the candidate, kept raw so the validator can reject
/// individual entries rather than the whole payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDay {
    pub key: String,
    /// `None` when the key is not a calendar date.
    pub date: Option<NaiveDate>,
    pub entries: Vec<Value>,
    /// False when the value under the key was not an array; its single value
    /// is kept in `entries` for the ledger.
    pub is_list: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSchedule {
    pub days: Vec<CandidateDay>,
}

impl CandidateSchedule {
    pub fn parse(raw: &str) -> Result<Self> {
        let map = extract_payload(raw)?;
        Ok(Self::from_map(map))
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let days = map
            .into_iter()
            .map(|(key, value)| {
                let date = NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d").ok();
                let (entries, is_list) = match value {
                    Value::Array(items) => (items, true),
                    other => (vec![other], false),
                };
                CandidateDay { key, date, entries, is_list }
            })
            .collect();
        Self { days }
    }

    pub fn entry_count(&self) -> usize {
        self.days.iter().map(|d| d.entries.len()).sum()
    }
}

/// Pull the schedule object out of a generator's text response.
pub fn extract_payload(raw: &str) -> Result<Map<String, Value>> {
    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)```")
        .map_err(|e| ScheduleError::Parse(e.to_string()))?;

    let body = match fence.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => outermost_object(raw).unwrap_or(raw.trim()),
    };
    if body.len() < MIN_PAYLOAD_LEN {
        return Err(ScheduleError::Parse(format!(
            "payload too short ({} chars)",
            body.len()
        )));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ScheduleError::Parse(format!("not valid JSON: {e}")))?;
    let Value::Object(mut obj) = value else {
        return Err(ScheduleError::Parse("payload is not a JSON object".into()));
    };

    match obj.remove("schedule") {
        Some(Value::Object(schedule)) => {
            debug!(dates = schedule.len(), "extracted candidate schedule");
            Ok(schedule)
        }
        Some(_) => Err(ScheduleError::Parse("'schedule' is not an object".into())),
        None if !obj.is_empty() && obj.keys().all(|k| looks_like_date(k)) => Ok(obj),
        None => Err(ScheduleError::Parse("no 'schedule' object in payload".into())),
    }
}

fn outermost_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn looks_like_date(key: &str) -> bool {
    let b = key.trim().as_bytes();
    b.len() == 10 && b[4] == b'-' && b[7] == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"schedule": {"2024-01-13": [{"time": "10:00", "duration": 45, "topic": "Bonding", "type": "practice"}]}}"#;

    #[test]
    fn test_extracts_fenced_json() {
        let raw = format!("Here you go!\n```json\n{BODY}\n```\nGood luck.");
        let map = extract_payload(&raw).unwrap();
        assert!(map.contains_key("2024-01-13"));
    }

    #[test]
    fn test_extracts_from_commentary_without_fence() {
        let raw = format!("Sure, the timetable is {BODY} - let me know.");
        let schedule = CandidateSchedule::parse(&raw).unwrap();
        assert_eq!(schedule.days.len(), 1);
        assert_eq!(schedule.days[0].date, NaiveDate::from_ymd_opt(2024, 1, 13));
        assert_eq!(schedule.entry_count(), 1);
    }

    #[test]
    fn test_accepts_bare_date_map() {
        let map = extract_payload(r#"{"2024-01-13": [], "2024-01-14": []}"#).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_rejects_unrecoverable_payloads() {
        for raw in ["", "{}", "no json here at all", r#"{"schedule": [1, 2, 3]}"#, r#"{"timetable": {"a": 1}}"#, "```json\n{\"schedule\": {\n```"] {
            assert!(
                matches!(extract_payload(raw), Err(ScheduleError::Parse(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_bad_date_keys_and_non_lists_are_kept_for_the_ledger() {
        let schedule =
            CandidateSchedule::parse(r#"{"schedule": {"Monday": [{"type": "break"}], "2024-01-14": {"type": "practice"}}}"#)
                .unwrap();
        let monday = schedule.days.iter().find(|d| d.key == "Monday").unwrap();
        assert!(monday.date.is_none());
        let sunday = schedule.days.iter().find(|d| d.key == "2024-01-14").unwrap();
        assert!(!sunday.is_list);
        assert_eq!(sunday.entries.len(), 1);
    }
}
