use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::exam_definition::Term;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScoreEntry {
    pub key: String,
    pub score_name: String,
    pub score: f64,
}

impl ScoreEntry {
    pub fn same_name(&self, other: &ScoreEntry) -> bool {
        self.score_name.eq_ignore_ascii_case(&other.score_name)
    }
}

fn contains_named(scores: &[ScoreEntry], entry: &ScoreEntry) -> bool {
    scores.iter().any(|s| s.same_name(entry))
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SubjectTermResult {
    pub term: Term,
    #[serde(default)]
    pub scores: Vec<ScoreEntry>,
    #[serde(default)]
    pub exam_object: Vec<ScoreEntry>,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub cumulative_average: f64,
    #[serde(default)]
    pub subject_position: String,
}

/// Per-student, per-subject result record for a session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SubjectResult {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub academic_session_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub term_results: Vec<SubjectTermResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl SubjectResult {
    pub fn new(student_id: &str, class_id: &str, academic_session_id: &str, subject_id: &str) -> Self {
        SubjectResult {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            academic_session_id: academic_session_id.to_string(),
            subject_id: subject_id.to_string(),
            term_results: Vec::new(),
            modified_at: Some(Utc::now()),
        }
    }

    /// Appends an exam-component score for the term. Returns false when a score
    /// with the same name is already recorded, leaving the record untouched.
    pub fn record_exam_score(&mut self, term: Term, entry: &ScoreEntry) -> bool {
        let index = match self.term_results.iter().position(|t| t.term == term) {
            Some(index) => index,
            None => {
                self.term_results.push(SubjectTermResult {
                    term,
                    scores: Vec::new(),
                    exam_object: Vec::new(),
                    total_score: 0.0,
                    cumulative_average: 0.0,
                    subject_position: String::new(),
                });
                self.term_results.len() - 1
            }
        };
        let term_result = &mut self.term_results[index];

        if contains_named(&term_result.exam_object, entry) {
            return false;
        }
        if !contains_named(&term_result.scores, entry) {
            term_result.scores.push(entry.clone());
        }
        term_result.exam_object.push(entry.clone());
        self.modified_at = Some(Utc::now());
        true
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SubjectScoreSummary {
    pub subject_id: String,
    pub subject_teacher_id: String,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub cumulative_average: f64,
    #[serde(default)]
    pub last_term_cumulative: f64,
    #[serde(default)]
    pub scores: Vec<ScoreEntry>,
    #[serde(default)]
    pub exam_object: Vec<ScoreEntry>,
    #[serde(default)]
    pub subject_position: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TermResult {
    pub term: Term,
    #[serde(default)]
    pub cumulative_score: f64,
    #[serde(default)]
    pub class_position: String,
    #[serde(default)]
    pub subject_results: Vec<SubjectScoreSummary>,
}

/// Aggregate per-student result record for a session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StudentResult {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub academic_session_id: String,
    #[serde(default)]
    pub term_results: Vec<TermResult>,
    #[serde(default)]
    pub final_cumulative_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl StudentResult {
    pub fn new(student_id: &str, class_id: &str, academic_session_id: &str) -> Self {
        StudentResult {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            academic_session_id: academic_session_id.to_string(),
            term_results: Vec::new(),
            final_cumulative_score: 0.0,
            modified_at: Some(Utc::now()),
        }
    }

    /// Records the exam score under the term and subject, creating either when absent.
    /// Returns false when the subject already carries a score with the same name.
    pub fn record_exam_score(
        &mut self,
        term: Term,
        subject_id: &str,
        subject_teacher_id: &str,
        entry: &ScoreEntry,
    ) -> bool {
        let term_index = match self.term_results.iter().position(|t| t.term == term) {
            Some(index) => index,
            None => {
                self.term_results.push(TermResult {
                    term,
                    cumulative_score: 0.0,
                    class_position: String::new(),
                    subject_results: Vec::new(),
                });
                self.term_results.len() - 1
            }
        };
        let term_result = &mut self.term_results[term_index];

        let recorded = match term_result
            .subject_results
            .iter_mut()
            .find(|s| s.subject_id == subject_id)
        {
            Some(subject) => {
                if contains_named(&subject.exam_object, entry) {
                    false
                } else {
                    subject.exam_object.push(entry.clone());
                    if !contains_named(&subject.scores, entry) {
                        subject.scores.push(entry.clone());
                    }
                    true
                }
            }
            None => {
                term_result.subject_results.push(SubjectScoreSummary {
                    subject_id: subject_id.to_string(),
                    subject_teacher_id: subject_teacher_id.to_string(),
                    total_score: 0.0,
                    cumulative_average: 0.0,
                    last_term_cumulative: 0.0,
                    scores: vec![entry.clone()],
                    exam_object: vec![entry.clone()],
                    subject_position: String::new(),
                });
                true
            }
        };

        if recorded {
            self.modified_at = Some(Utc::now());
        }
        recorded
    }

    pub fn subject(&self, term: Term, subject_id: &str) -> Option<&SubjectScoreSummary> {
        self.term_results
            .iter()
            .find(|t| t.term == term)?
            .subject_results
            .iter()
            .find(|s| s.subject_id == subject_id)
    }
}
