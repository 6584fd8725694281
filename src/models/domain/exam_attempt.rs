use async_graphql::Enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::exam_definition::Term;
use crate::models::domain::question_set::{ExamWindow, QuestionSet};

/// Persisted attempt status. "Not started" is never stored: it is the absence of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    ForceEnded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::ForceEnded => "force_ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// Why an attempt was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ManualSubmit,
    TimeExpired,
    ForcedClose,
}

impl TriggerType {
    pub fn resulting_status(&self) -> AttemptStatus {
        match self {
            TriggerType::ManualSubmit | TriggerType::TimeExpired => AttemptStatus::Submitted,
            TriggerType::ForcedClose => AttemptStatus::ForceEnded,
        }
    }
}

/// Attempts are keyed per student, never on shared collections.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct AttemptKey {
    pub exam_id: String,
    pub subject_id: String,
    pub class_id: String,
    pub student_id: String,
}

/// A student's private copy of one pool question.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttemptQuestion {
    pub question_id: String,
    pub shuffled_number: i32,
    pub original_number: i32,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_answer: Option<String>,
    pub student_score: Option<i32>,
    // server-side only
    pub score: i32,
    pub correct_answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnswerUpdate {
    pub question_id: String,
    pub selected_answer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExamAttempt {
    pub id: String,
    pub exam_id: String,
    pub academic_session_id: String,
    pub term: Term,
    pub class_id: String,
    pub subject_id: String,
    pub subject_teacher_id: String,
    pub level: String,
    pub student_id: String,
    pub shuffled_obj_questions: Vec<AttemptQuestion>,
    pub shuffle_seed: i64,
    /// Seconds.
    pub obj_total_time_allocated: i64,
    /// Client-reported checkpoint in seconds; never authoritative.
    pub obj_time_left: i64,
    pub window: ExamWindow,
    pub obj_status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_trigger_type: Option<TriggerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_total_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ExamAttempt {
    pub fn start(
        question_set: &QuestionSet,
        student_id: &str,
        shuffled_obj_questions: Vec<AttemptQuestion>,
        shuffle_seed: u64,
        now: DateTime<Utc>,
    ) -> Self {
        ExamAttempt {
            id: Uuid::new_v4().to_string(),
            exam_id: question_set.exam_id.clone(),
            academic_session_id: question_set.academic_session_id.clone(),
            term: question_set.term,
            class_id: question_set.class_id.clone(),
            subject_id: question_set.subject_id.clone(),
            subject_teacher_id: question_set.teacher_id.clone(),
            level: question_set.level.clone(),
            student_id: student_id.to_string(),
            shuffled_obj_questions,
            // stored as i64 bit pattern so it survives BSON
            shuffle_seed: shuffle_seed as i64,
            obj_total_time_allocated: question_set.obj_total_time_allocated,
            obj_time_left: question_set.obj_total_time_allocated,
            window: question_set.window,
            obj_status: AttemptStatus::InProgress,
            obj_trigger_type: None,
            obj_submitted_at: None,
            objective_total_score: None,
            percent_score: None,
            created_at: Some(now),
            modified_at: Some(now),
        }
    }

    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            exam_id: self.exam_id.clone(),
            subject_id: self.subject_id.clone(),
            class_id: self.class_id.clone(),
            student_id: self.student_id.clone(),
        }
    }

    /// Overwrites selected answers for known question ids; unknown ids are dropped.
    /// Returns how many entries matched.
    pub fn apply_answers(&mut self, answers: &[AnswerUpdate]) -> usize {
        let mut applied = 0;
        for answer in answers {
            if let Some(question) = self
                .shuffled_obj_questions
                .iter_mut()
                .find(|q| q.question_id == answer.question_id)
            {
                question.selected_answer = answer.selected_answer.clone();
                applied += 1;
            }
        }
        applied
    }

    pub fn max_score(&self) -> i32 {
        self.shuffled_obj_questions.iter().map(|q| q.score).sum()
    }
}

/// Interface-level view of an attempt's state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptState {
    NotStarted,
    InProgress(ExamAttempt),
    Submitted(ExamAttempt),
    ForceEnded(ExamAttempt),
}

impl AttemptState {
    pub fn from_record(record: Option<ExamAttempt>) -> Self {
        match record {
            None => AttemptState::NotStarted,
            Some(attempt) => match attempt.obj_status {
                AttemptStatus::InProgress => AttemptState::InProgress(attempt),
                AttemptStatus::Submitted => AttemptState::Submitted(attempt),
                AttemptStatus::ForceEnded => AttemptState::ForceEnded(attempt),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptState::NotStarted => "not_started",
            AttemptState::InProgress(_) => "in_progress",
            AttemptState::Submitted(_) => "submitted",
            AttemptState::ForceEnded(_) => "force_ended",
        }
    }
}
