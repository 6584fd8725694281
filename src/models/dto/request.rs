use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{AnswerUpdate, QuestionBounds, Term, TriggerType};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExamDefinitionRequest {
    #[validate(length(min = 1))]
    pub academic_session_id: String,

    pub term: Term,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(range(min = 1))]
    pub min_obj_questions: i32,

    #[validate(range(min = 1))]
    pub max_obj_questions: i32,

    #[validate(range(min = 2))]
    pub expected_obj_number_of_options: i32,

    #[validate(range(min = 1))]
    pub number_of_questions_per_student: i32,
}

impl CreateExamDefinitionRequest {
    pub fn bounds(&self) -> QuestionBounds {
        QuestionBounds {
            min_obj_questions: self.min_obj_questions,
            max_obj_questions: self.max_obj_questions,
            expected_obj_number_of_options: self.expected_obj_number_of_options,
            number_of_questions_per_student: self.number_of_questions_per_student,
        }
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateExamDefinitionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(range(min = 1))]
    pub min_obj_questions: Option<i32>,

    #[validate(range(min = 1))]
    pub max_obj_questions: Option<i32>,

    #[validate(range(min = 2))]
    pub expected_obj_number_of_options: Option<i32>,

    #[validate(range(min = 1))]
    pub number_of_questions_per_student: Option<i32>,
}

impl UpdateExamDefinitionRequest {
    pub fn merge_into(&self, current: QuestionBounds) -> QuestionBounds {
        QuestionBounds {
            min_obj_questions: self.min_obj_questions.unwrap_or(current.min_obj_questions),
            max_obj_questions: self.max_obj_questions.unwrap_or(current.max_obj_questions),
            expected_obj_number_of_options: self
                .expected_obj_number_of_options
                .unwrap_or(current.expected_obj_number_of_options),
            number_of_questions_per_student: self
                .number_of_questions_per_student
                .unwrap_or(current.number_of_questions_per_student),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExamDefinitionSearchParams {
    pub search: Option<String>,

    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl ExamDefinitionSearchParams {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).min(100)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ScheduleSlotRequest {
    #[validate(length(min = 1))]
    pub subject_id: String,

    pub start_time: DateTime<Utc>,

    /// Objective paper duration in seconds, at most one day.
    #[validate(range(min = 1, max = 86_400))]
    pub duration: i64,

    pub theory_start_time: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 86_400))]
    pub theory_duration: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTimetableRequest {
    #[validate(length(min = 1))]
    pub academic_session_id: String,

    pub term: Term,

    #[validate(length(min = 1), nested)]
    pub timetable: Vec<ScheduleSlotRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct QuestionInput {
    #[validate(range(min = 1))]
    pub question_number: i32,

    #[validate(length(min = 1))]
    pub question_text: String,

    pub options: Vec<String>,

    #[validate(range(min = 0))]
    pub correct_option: i32,

    #[validate(range(min = 0))]
    pub score: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BindQuestionsRequest {
    #[validate(length(min = 1))]
    pub academic_session_id: String,

    pub term: Term,

    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthorizeStudentsRequest {
    #[validate(length(min = 1))]
    pub academic_session_id: String,

    pub term: Term,

    #[validate(length(min = 1))]
    pub subject_id: String,

    #[validate(length(min = 1, message = "At least one student must be named"))]
    pub student_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartExamRequest {
    #[validate(length(min = 1))]
    pub academic_session_id: String,

    #[validate(length(min = 1))]
    pub class_id: String,

    #[validate(length(min = 1))]
    pub subject_id: String,

    pub term: Term,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(length(min = 1))]
    pub question_id: String,

    pub selected_answer: Option<String>,
}

impl From<AnswerInput> for AnswerUpdate {
    fn from(input: AnswerInput) -> Self {
        AnswerUpdate {
            question_id: input.question_id,
            selected_answer: input.selected_answer,
        }
    }
}

pub fn into_answer_updates(answers: Vec<AnswerInput>) -> Vec<AnswerUpdate> {
    answers.into_iter().map(AnswerUpdate::from).collect()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAnswersRequest {
    #[validate(length(min = 1))]
    pub attempt_id: String,

    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTimeRequest {
    #[validate(length(min = 1))]
    pub attempt_id: String,

    /// Seconds left as reported by the client.
    #[validate(range(min = 0))]
    pub remaining_time: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitExamRequest {
    #[validate(length(min = 1))]
    pub attempt_id: String,

    pub trigger_type: TriggerType,

    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,

    #[validate(range(min = 0))]
    pub time_left: Option<i64>,
}

/// Administrative force-close of one student's attempt.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForceEndRequest {
    #[validate(length(min = 1))]
    pub attempt_id: String,
}
