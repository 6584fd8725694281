use async_graphql::SimpleObject;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CutoffPolicy;
use crate::errors::{AppError, AppResult};
use crate::models::domain::exam_definition::Term;

/// Authoritative time window of one subject exam, derived once at question-binding time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, SimpleObject)]
pub struct ExamWindow {
    pub start_time: DateTime<Utc>,
    pub initial_cutoff_time: DateTime<Utc>,
    pub final_cutoff_time: DateTime<Utc>,
}

impl ExamWindow {
    /// Fails with `ValidationError` when the duration does not fit on the calendar.
    pub fn derive(
        start_time: DateTime<Utc>,
        duration_secs: i64,
        cutoffs: &CutoffPolicy,
    ) -> AppResult<Self> {
        let out_of_range = || {
            AppError::ValidationError(format!(
                "Exam duration of {} seconds is out of range",
                duration_secs
            ))
        };
        let initial_cutoff_time = start_time
            .checked_add_signed(cutoffs.cutoff_before())
            .ok_or_else(out_of_range)?;
        let final_cutoff_time = Duration::try_seconds(duration_secs)
            .and_then(|length| start_time.checked_add_signed(length))
            .and_then(|end| end.checked_add_signed(cutoffs.cutoff_after()))
            .ok_or_else(out_of_range)?;
        Ok(ExamWindow {
            start_time,
            initial_cutoff_time,
            final_cutoff_time,
        })
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn submission_deadline(&self, grace: Duration) -> DateTime<Utc> {
        self.final_cutoff_time + grace
    }
}

/// Key of a bound question pool: one per (exam, class, subject, term).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SubjectExamKey {
    pub exam_id: String,
    pub academic_session_id: String,
    pub class_id: String,
    pub subject_id: String,
    pub term: Term,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectiveQuestion {
    pub id: String,
    pub question_number: i32,
    pub question_text: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_option: i32,
    /// Point value.
    pub score: i32,
}

impl ObjectiveQuestion {
    pub fn correct_answer(&self) -> Option<&str> {
        usize::try_from(self.correct_option)
            .ok()
            .and_then(|idx| self.options.get(idx))
            .map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionSet {
    pub id: String,
    pub exam_id: String,
    pub academic_session_id: String,
    pub class_id: String,
    pub subject_id: String,
    pub term: Term,
    pub teacher_id: String,
    pub level: String,
    pub obj_questions: Vec<ObjectiveQuestion>,
    pub window: ExamWindow,
    /// Time budget per student in seconds.
    pub obj_total_time_allocated: i64,
    #[serde(default)]
    pub allowed_students: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl QuestionSet {
    pub fn new(
        key: &SubjectExamKey,
        teacher_id: &str,
        level: &str,
        obj_questions: Vec<ObjectiveQuestion>,
        window: ExamWindow,
        obj_total_time_allocated: i64,
        now: DateTime<Utc>,
    ) -> Self {
        QuestionSet {
            id: Uuid::new_v4().to_string(),
            exam_id: key.exam_id.clone(),
            academic_session_id: key.academic_session_id.clone(),
            class_id: key.class_id.clone(),
            subject_id: key.subject_id.clone(),
            term: key.term,
            teacher_id: teacher_id.to_string(),
            level: level.to_string(),
            obj_questions,
            window,
            obj_total_time_allocated,
            allowed_students: Vec::new(),
            created_at: Some(now),
        }
    }

    pub fn key(&self) -> SubjectExamKey {
        SubjectExamKey {
            exam_id: self.exam_id.clone(),
            academic_session_id: self.academic_session_id.clone(),
            class_id: self.class_id.clone(),
            subject_id: self.subject_id.clone(),
            term: self.term,
        }
    }

    pub fn is_student_allowed(&self, student_id: &str) -> bool {
        self.allowed_students.iter().any(|s| s == student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_is_derived_from_start_duration_and_cutoffs() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap();
        let cutoffs = CutoffPolicy {
            first_cutoff_minutes: 10,
            last_cutoff_minutes: 5,
            grace_period_minutes: 5,
        };
        let window = ExamWindow::derive(start, 3600, &cutoffs).unwrap();

        assert_eq!(window.initial_cutoff_time, Utc.with_ymd_and_hms(2030, 5, 1, 9, 10, 0).unwrap());
        assert_eq!(window.final_cutoff_time, Utc.with_ymd_and_hms(2030, 5, 1, 10, 5, 0).unwrap());
        assert_eq!(
            window.submission_deadline(cutoffs.grace_period()),
            Utc.with_ymd_and_hms(2030, 5, 1, 10, 10, 0).unwrap()
        );
    }

    #[test]
    fn window_starts_at_the_slot_start() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap();
        let window = ExamWindow::derive(start, 600, &CutoffPolicy::default()).unwrap();

        assert!(!window.has_started(start - Duration::seconds(1)));
        assert!(window.has_started(start));
    }

    #[test]
    fn overflowing_duration_is_rejected() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap();
        for duration in [1_000_000_000_000_000, i64::MAX / 1000 - 1, i64::MAX] {
            assert!(matches!(
                ExamWindow::derive(start, duration, &CutoffPolicy::default()),
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn correct_answer_resolves_option_text() {
        let question = ObjectiveQuestion {
            id: "q1".to_string(),
            question_number: 1,
            question_text: "2 + 2".to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_option: 1,
            score: 2,
        };
        assert_eq!(question.correct_answer(), Some("4"));

        let broken = ObjectiveQuestion { correct_option: 9, ..question };
        assert_eq!(broken.correct_answer(), None);
    }
}
