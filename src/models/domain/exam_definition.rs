use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, Enum, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    FirstTerm,
    SecondTerm,
    ThirdTerm,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::FirstTerm => "first_term",
            Term::SecondTerm => "second_term",
            Term::ThirdTerm => "third_term",
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Term {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_term" => Ok(Term::FirstTerm),
            "second_term" => Ok(Term::SecondTerm),
            "third_term" => Ok(Term::ThirdTerm),
            other => Err(AppError::ValidationError(format!("Unknown term '{}'", other))),
        }
    }
}

/// School-wide CBT configuration for one (session, term).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct ExamDefinition {
    pub id: String,
    pub academic_session_id: String,
    pub term: Term,
    pub title: String,
    pub min_obj_questions: i32,
    pub max_obj_questions: i32,
    pub expected_obj_number_of_options: i32,
    pub number_of_questions_per_student: i32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuestionBounds {
    pub min_obj_questions: i32,
    pub max_obj_questions: i32,
    pub expected_obj_number_of_options: i32,
    pub number_of_questions_per_student: i32,
}

impl QuestionBounds {
    pub fn validate(&self) -> AppResult<()> {
        if self.min_obj_questions < 1 {
            return Err(AppError::ValidationError(
                "Minimum objective question count must be at least 1".to_string(),
            ));
        }
        if self.min_obj_questions > self.max_obj_questions {
            return Err(AppError::ValidationError(format!(
                "Minimum objective question count ({}) exceeds the maximum ({})",
                self.min_obj_questions, self.max_obj_questions
            )));
        }
        if self.expected_obj_number_of_options < 2 {
            return Err(AppError::ValidationError(
                "Each question needs at least 2 options".to_string(),
            ));
        }
        if self.number_of_questions_per_student < 1
            || self.number_of_questions_per_student > self.min_obj_questions
        {
            return Err(AppError::ValidationError(format!(
                "Questions per student must be between 1 and the minimum question count ({})",
                self.min_obj_questions
            )));
        }
        Ok(())
    }
}

impl ExamDefinition {
    pub fn new(
        academic_session_id: &str,
        term: Term,
        title: &str,
        bounds: QuestionBounds,
    ) -> AppResult<Self> {
        bounds.validate()?;
        let now = Utc::now();

        Ok(ExamDefinition {
            id: Uuid::new_v4().to_string(),
            academic_session_id: academic_session_id.to_string(),
            term,
            title: title.trim().to_string(),
            min_obj_questions: bounds.min_obj_questions,
            max_obj_questions: bounds.max_obj_questions,
            expected_obj_number_of_options: bounds.expected_obj_number_of_options,
            number_of_questions_per_student: bounds.number_of_questions_per_student,
            is_active: true,
            created_at: Some(now),
            modified_at: Some(now),
        })
    }

    pub fn bounds(&self) -> QuestionBounds {
        QuestionBounds {
            min_obj_questions: self.min_obj_questions,
            max_obj_questions: self.max_obj_questions,
            expected_obj_number_of_options: self.expected_obj_number_of_options,
            number_of_questions_per_student: self.number_of_questions_per_student,
        }
    }

    pub fn apply_bounds(&mut self, bounds: QuestionBounds) -> AppResult<()> {
        bounds.validate()?;
        self.min_obj_questions = bounds.min_obj_questions;
        self.max_obj_questions = bounds.max_obj_questions;
        self.expected_obj_number_of_options = bounds.expected_obj_number_of_options;
        self.number_of_questions_per_student = bounds.number_of_questions_per_student;
        self.modified_at = Some(Utc::now());
        Ok(())
    }
}
