use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::exam_definition::Term;

/// One subject slot in a class timetable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct TimetableEntry {
    pub subject_id: String,
    pub start_time: DateTime<Utc>,
    /// Objective paper duration in seconds.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theory_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theory_duration: Option<i64>,
    #[serde(default)]
    pub is_subject_question_set: bool,
    #[serde(default)]
    pub authorized_students: Vec<String>,
    #[serde(default)]
    pub students_that_have_started: Vec<String>,
    #[serde(default)]
    pub students_that_have_submitted: Vec<String>,
}

impl TimetableEntry {
    pub fn new(subject_id: &str, start_time: DateTime<Utc>, duration: i64) -> Self {
        TimetableEntry {
            subject_id: subject_id.to_string(),
            start_time,
            duration,
            theory_start_time: None,
            theory_duration: None,
            is_subject_question_set: false,
            authorized_students: Vec::new(),
            students_that_have_started: Vec::new(),
            students_that_have_submitted: Vec::new(),
        }
    }

    pub fn participants(&self, set: ParticipationSet) -> &[String] {
        match set {
            ParticipationSet::Authorized => &self.authorized_students,
            ParticipationSet::Started => &self.students_that_have_started,
            ParticipationSet::Submitted => &self.students_that_have_submitted,
        }
    }

    pub fn participants_mut(&mut self, set: ParticipationSet) -> &mut Vec<String> {
        match set {
            ParticipationSet::Authorized => &mut self.authorized_students,
            ParticipationSet::Started => &mut self.students_that_have_started,
            ParticipationSet::Submitted => &mut self.students_that_have_submitted,
        }
    }
}

/// The three per-subject participation sets kept on a timetable entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Enum)]
pub enum ParticipationSet {
    Authorized,
    Started,
    Submitted,
}

impl ParticipationSet {
    pub fn field_name(&self) -> &'static str {
        match self {
            ParticipationSet::Authorized => "authorized_students",
            ParticipationSet::Started => "students_that_have_started",
            ParticipationSet::Submitted => "students_that_have_submitted",
        }
    }
}

/// Set-union, preserving first-seen order.
pub fn add_to_set(target: &mut Vec<String>, ids: &[String]) {
    for id in ids {
        if !target.contains(id) {
            target.push(id.clone());
        }
    }
}

pub fn pull_from_set(target: &mut Vec<String>, id: &str) {
    target.retain(|existing| existing != id);
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct Timetable {
    pub id: String,
    pub exam_id: String,
    pub academic_session_id: String,
    pub class_id: String,
    pub term: Term,
    pub scheduled_subjects: Vec<TimetableEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Timetable {
    pub fn new(
        exam_id: &str,
        academic_session_id: &str,
        class_id: &str,
        term: Term,
        scheduled_subjects: Vec<TimetableEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        Timetable {
            id: Uuid::new_v4().to_string(),
            exam_id: exam_id.to_string(),
            academic_session_id: academic_session_id.to_string(),
            class_id: class_id.to_string(),
            term,
            scheduled_subjects,
            created_at: Some(now),
        }
    }

    pub fn entry(&self, subject_id: &str) -> Option<&TimetableEntry> {
        self.scheduled_subjects
            .iter()
            .find(|s| s.subject_id == subject_id)
    }

    pub fn entry_mut(&mut self, subject_id: &str) -> Option<&mut TimetableEntry> {
        self.scheduled_subjects
            .iter_mut()
            .find(|s| s.subject_id == subject_id)
    }
}
