use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{
    AttemptQuestion, AttemptStatus, ExamAttempt, ExamWindow, TriggerType,
};

/// Question as shown to a student: no correct answer, no point value.
#[derive(Debug, Clone, PartialEq, Serialize, SimpleObject)]
pub struct SanitizedQuestion {
    pub question_id: String,
    pub question_number: i32,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_answer: Option<String>,
}

impl From<&AttemptQuestion> for SanitizedQuestion {
    fn from(question: &AttemptQuestion) -> Self {
        SanitizedQuestion {
            question_id: question.question_id.clone(),
            question_number: question.shuffled_number,
            question_text: question.question_text.clone(),
            options: question.options.clone(),
            selected_answer: question.selected_answer.clone(),
        }
    }
}

/// Student-facing view of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, SimpleObject)]
pub struct AttemptView {
    pub attempt_id: String,
    pub exam_id: String,
    pub subject_id: String,
    pub class_id: String,
    pub status: AttemptStatus,
    pub questions: Vec<SanitizedQuestion>,
    pub obj_total_time_allocated: i64,
    pub obj_time_left: i64,
    pub window: ExamWindow,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<&ExamAttempt> for AttemptView {
    fn from(attempt: &ExamAttempt) -> Self {
        AttemptView {
            attempt_id: attempt.id.clone(),
            exam_id: attempt.exam_id.clone(),
            subject_id: attempt.subject_id.clone(),
            class_id: attempt.class_id.clone(),
            status: attempt.obj_status,
            questions: attempt
                .shuffled_obj_questions
                .iter()
                .map(SanitizedQuestion::from)
                .collect(),
            obj_total_time_allocated: attempt.obj_total_time_allocated,
            obj_time_left: attempt.obj_time_left,
            window: attempt.window,
            submitted_at: attempt.obj_submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub attempt_id: String,
    pub raw_score: i32,
    pub max_score: i32,
    pub raw_percentage: f64,
    pub weighted_score: f64,
    pub status: AttemptStatus,
    pub trigger: TriggerType,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncAck {
    pub attempt_id: String,
    pub applied: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationOutcome {
    pub subject_id: String,
    pub newly_authorized: Vec<String>,
    pub already_authorized: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            data,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_question_hides_grading_fields() {
        let question = AttemptQuestion {
            question_id: "q1".into(),
            shuffled_number: 3,
            original_number: 7,
            question_text: "Capital of France?".into(),
            options: vec!["Rome".into(), "Paris".into()],
            selected_answer: None,
            student_score: None,
            score: 2,
            correct_answer: "Paris".into(),
        };

        let json = serde_json::to_value(SanitizedQuestion::from(&question)).unwrap();
        assert_eq!(json["question_number"], 3);
        assert!(json.get("correct_answer").is_none());
        assert!(json.get("score").is_none());
        assert!(json.get("original_number").is_none());
    }
}
