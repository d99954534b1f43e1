//! Closed identity lists for topics, homework and blocked events.
//!
//! Built once per request from the caller's already-validated data and never
//! mutated afterwards, so every entry of a candidate is matched against the
//! same snapshot.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{BlockedEvent, Homework, Subject, Topic};

/// Normalize a display string into a matching key: trim, collapse inner
/// whitespace, lowercase.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicIdentity {
    /// Literal spelling as supplied by the caller.
    pub name: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeworkIdentity {
    pub title: String,
    pub subject: String,
    /// Earliest due date among homework sharing this title.
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    topics: HashMap<String, TopicIdentity>,
    homework: HashMap<String, HomeworkIdentity>,
    events: HashMap<String, String>,
    subjects_by_name: HashMap<String, String>,
}

impl IdentitySet {
    pub fn build(
        subjects: &[Subject],
        topics: &[Topic],
        homework: &[Homework],
        events: &[BlockedEvent],
    ) -> Self {
        let mut set = IdentitySet::default();

        for s in subjects {
            set.subjects_by_name
                .entry(normalize(&s.name))
                .or_insert_with(|| s.id.clone());
        }

        for t in topics {
            set.topics.entry(normalize(&t.name)).or_insert_with(|| TopicIdentity {
                name: t.name.trim().to_string(),
                subject_id: t.subject_id.clone(),
            });
        }

        for hw in homework {
            let key = normalize(&hw.title);
            match set.homework.get_mut(&key) {
                Some(existing) if hw.due_date < existing.due_date => {
                    existing.due_date = hw.due_date;
                    existing.subject = hw.subject.clone();
                }
                Some(_) => {}
                None => {
                    set.homework.insert(
                        key,
                        HomeworkIdentity {
                            title: hw.title.trim().to_string(),
                            subject: hw.subject.clone(),
                            due_date: hw.due_date,
                        },
                    );
                }
            }
        }

        for e in events {
            set.events
                .entry(normalize(&e.title))
                .or_insert_with(|| e.title.trim().to_string());
        }

        set
    }

    pub fn topic(&self, title: &str) -> Option<&TopicIdentity> {
        self.topics.get(&normalize(title))
    }

    pub fn homework(&self, title: &str) -> Option<&HomeworkIdentity> {
        self.homework.get(&normalize(title))
    }

    /// Event title this string impersonates, if any.
    pub fn event(&self, title: &str) -> Option<&str> {
        self.events.get(&normalize(title)).map(String::as_str)
    }

    pub fn subject_id_for_name(&self, name: &str) -> Option<&str> {
        self.subjects_by_name.get(&normalize(name)).map(String::as_str)
    }

    /// Literal topic names, sorted for deterministic output.
    pub fn topic_names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.topics.values().map(|t| t.name.clone()).collect();
        v.sort();
        v
    }

    pub fn homework_titles(&self) -> Vec<String> {
        let mut v: Vec<String> = self.homework.values().map(|h| h.title.clone()).collect();
        v.sort();
        v
    }

    pub fn event_titles(&self) -> Vec<String> {
        let mut v: Vec<String> = self.events.values().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hw(title: &str, due: (i32, u32, u32)) -> Homework {
        Homework {
            id: None,
            title: title.to_string(),
            subject: "English".to_string(),
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            duration: None,
            description: None,
        }
    }

    #[test]
    fn test_normalize_trims_collapses_and_folds() {
        assert_eq!(normalize("  Quadratic   Equations \n"), "quadratic equations");
        assert_eq!(normalize("BADMINTON"), "badminton");
    }

    #[test]
    fn test_topic_lookup_is_case_and_whitespace_insensitive() {
        let topics = vec![Topic {
            name: "Cell Structure".to_string(),
            subject_id: "bio".to_string(),
        }];
        let set = IdentitySet::build(&[], &topics, &[], &[]);
        let t = set.topic(" cell   structure").unwrap();
        assert_eq!(t.name, "Cell Structure");
        assert!(set.topic("Cells").is_none());
    }

    #[test]
    fn test_duplicate_homework_titles_keep_earliest_due_date() {
        let set = IdentitySet::build(
            &[],
            &[],
            &[hw("Essay", (2024, 1, 20)), hw("essay", (2024, 1, 15))],
            &[],
        );
        assert_eq!(
            set.homework("ESSAY").unwrap().due_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(set.homework_titles(), vec!["Essay".to_string()]);
    }
}
