//! Study resource hints attached to session notes.

use crate::identity::normalize;
use crate::model::EntryKind;

const PAST_PAPER_SOURCES: &[&str] = &["PMT", "Study Mind", "SaveMyExams"];

/// Practice resources for a subject, best first.
pub fn practice_resources(subject: &str) -> &'static [&'static str] {
    let s = normalize(subject);
    if s.contains("math") {
        &["Dr Frost Maths", "Corbett Maths"]
    } else if s.contains("physics") {
        &["Revisely", "SaveMyExams", "Isaac Physics"]
    } else if s.contains("chemistry") || s.contains("biology") || s.contains("science") {
        &["Revisely", "SaveMyExams"]
    } else {
        &["SaveMyExams"]
    }
}

pub fn is_maths(subject: &str) -> bool {
    normalize(subject).contains("math")
}

/// A one-line note naming a resource for this kind of session.
pub fn resource_hint(kind: EntryKind, subject: &str, topic: &str) -> String {
    match kind {
        EntryKind::Practice | EntryKind::Study => {
            format!("Practice using {} - {topic}", practice_resources(subject)[0])
        }
        EntryKind::ExamQuestions => {
            format!("Exam questions from {} past papers - {topic}", PAST_PAPER_SOURCES[0])
        }
        EntryKind::Revision => {
            format!("Read and summarize revision notes on {topic} - use SaveMyExams notes")
        }
        EntryKind::Homework => format!("Complete homework: {topic}"),
        EntryKind::Break => "Rest and recharge - stay hydrated".to_string(),
    }
}

/// Resource list for the generation brief: (kind, sources).
pub fn resources_for(kind: EntryKind, subject: &str) -> Vec<&'static str> {
    match kind {
        EntryKind::ExamQuestions => PAST_PAPER_SOURCES.to_vec(),
        EntryKind::Revision => vec!["SaveMyExams"],
        EntryKind::Homework | EntryKind::Break => Vec::new(),
        _ => practice_resources(subject).to_vec(),
    }
}
