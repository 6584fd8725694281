use std::{collections::HashSet, sync::Arc};

use uuid::Uuid;
use validator::Validate;

use crate::{
    config::CutoffPolicy,
    errors::{AppError, AppResult},
    models::{
        domain::{ExamDefinition, ExamWindow, ObjectiveQuestion, QuestionSet, SubjectExamKey},
        dto::request::{BindQuestionsRequest, QuestionInput},
    },
    repositories::{
        ExamDefinitionRepository, QuestionSetRepository, SchoolDirectory, TimetableRepository,
        TransactionManager,
    },
    services::clock::Clock,
};

/// Pool checks against the exam's configured bounds.
pub fn validate_pool(questions: &[QuestionInput], definition: &ExamDefinition) -> AppResult<()> {
    let count = questions.len() as i32;
    if count < definition.min_obj_questions {
        return Err(AppError::ValidationError(format!(
            "{} questions were set but at least {} are expected",
            count, definition.min_obj_questions
        )));
    }
    if count > definition.max_obj_questions {
        return Err(AppError::ValidationError(format!(
            "{} questions were set but at most {} are allowed",
            count, definition.max_obj_questions
        )));
    }

    let expected_options = definition.expected_obj_number_of_options;
    let wrong_option_count: Vec<String> = questions
        .iter()
        .filter(|q| q.options.len() as i32 != expected_options)
        .map(|q| q.question_number.to_string())
        .collect();
    if !wrong_option_count.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Every question needs exactly {} options (check question {})",
            expected_options,
            wrong_option_count.join(", ")
        )));
    }

    if let Some(bad) = questions
        .iter()
        .find(|q| q.correct_option < 0 || q.correct_option as usize >= q.options.len())
    {
        return Err(AppError::ValidationError(format!(
            "Question {} marks an option that does not exist as correct",
            bad.question_number
        )));
    }

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for question in questions {
        let fingerprint = (question.question_text.trim().to_lowercase(), question.options.clone());
        if !seen.insert(fingerprint) {
            duplicates.push(question.question_text.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(AppError::Conflict(format!(
            "Duplicate question found for: {}",
            duplicates.join(", ")
        )));
    }

    Ok(())
}

pub struct QuestionBankService {
    question_sets: Arc<dyn QuestionSetRepository>,
    timetables: Arc<dyn TimetableRepository>,
    exam_definitions: Arc<dyn ExamDefinitionRepository>,
    directory: Arc<dyn SchoolDirectory>,
    transactions: Arc<dyn TransactionManager>,
    clock: Arc<dyn Clock>,
    cutoffs: CutoffPolicy,
}

impl QuestionBankService {
    pub fn new(
        question_sets: Arc<dyn QuestionSetRepository>,
        timetables: Arc<dyn TimetableRepository>,
        exam_definitions: Arc<dyn ExamDefinitionRepository>,
        directory: Arc<dyn SchoolDirectory>,
        transactions: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
        cutoffs: CutoffPolicy,
    ) -> Self {
        Self {
            question_sets,
            timetables,
            exam_definitions,
            directory,
            transactions,
            clock,
            cutoffs,
        }
    }

    /// Binds a question pool to one timetable slot and fixes the subject's exam window.
    pub async fn bind_questions(
        &self,
        teacher_id: &str,
        class_id: &str,
        subject_id: &str,
        request: BindQuestionsRequest,
    ) -> AppResult<QuestionSet> {
        request.validate()?;

        let session = self
            .directory
            .find_session(&request.academic_session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Academic session {}", request.academic_session_id))
            })?;
        if !session.is_term_active(request.term) {
            return Err(AppError::InvalidState(format!(
                "{} has ended; questions can no longer be set for it",
                request.term
            )));
        }

        let class = self
            .directory
            .find_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {}", class_id)))?;
        if !class.offers_subject(subject_id) {
            return Err(AppError::ValidationError(format!(
                "Subject {} is not offered in {}",
                subject_id, class.name
            )));
        }
        if let Some(assigned) = class.subject_teacher(subject_id) {
            if assigned != teacher_id {
                return Err(AppError::Unauthorized(format!(
                    "Only the subject teacher for {} in {} can set its questions",
                    subject_id, class.name
                )));
            }
        }

        let definition = self
            .exam_definitions
            .find_by_session_term(&request.academic_session_id, request.term)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No exam has been set up for {} of this session",
                    request.term
                ))
            })?;

        let timetable = self
            .timetables
            .find_for_class_term(class_id, &request.academic_session_id, request.term)
            .await?
            .filter(|t| t.exam_id == definition.id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "{} has no exam timetable for {}; create it before setting questions",
                    class.name, request.term
                ))
            })?;
        let entry = timetable.entry(subject_id).ok_or_else(|| {
            AppError::NotFound(format!("Subject {} is not on the timetable", subject_id))
        })?;

        validate_pool(&request.questions, &definition)?;

        let key = SubjectExamKey {
            exam_id: definition.id.clone(),
            academic_session_id: request.academic_session_id.clone(),
            class_id: class_id.to_string(),
            subject_id: subject_id.to_string(),
            term: request.term,
        };
        if let Some(existing) = self.question_sets.find_by_key(&key).await? {
            if !existing.obj_questions.is_empty() {
                return Err(AppError::Conflict(format!(
                    "Questions for {} have already been submitted",
                    subject_id
                )));
            }
        }

        let questions = request
            .questions
            .into_iter()
            .map(|q| ObjectiveQuestion {
                id: Uuid::new_v4().to_string(),
                question_number: q.question_number,
                question_text: q.question_text.trim().to_string(),
                options: q.options,
                correct_option: q.correct_option,
                score: q.score,
            })
            .collect();
        let window = ExamWindow::derive(entry.start_time, entry.duration, &self.cutoffs)?;
        let set = QuestionSet::new(
            &key,
            teacher_id,
            &class.level,
            questions,
            window,
            entry.duration,
            self.clock.now(),
        );

        let mut uow = self.transactions.begin().await?;
        if let Some(existing) = uow.find_question_set(&key).await? {
            if !existing.obj_questions.is_empty() {
                uow.abort().await?;
                return Err(AppError::Conflict(format!(
                    "Questions for {} have already been submitted",
                    subject_id
                )));
            }
        }
        uow.save_question_set(&set).await?;
        uow.mark_question_set_bound(&timetable.id, subject_id).await?;
        uow.commit().await?;

        log::info!(
            "Bound {} questions for subject {} in class {} (window {} to {})",
            set.obj_questions.len(),
            subject_id,
            class_id,
            set.window.start_time,
            set.window.final_cutoff_time
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{QuestionBounds, Term};

    fn definition() -> ExamDefinition {
        ExamDefinition::new(
            "sess",
            Term::FirstTerm,
            "Terminal Exam",
            QuestionBounds {
                min_obj_questions: 20,
                max_obj_questions: 40,
                expected_obj_number_of_options: 4,
                number_of_questions_per_student: 10,
            },
        )
        .unwrap()
    }

    fn questions(count: usize) -> Vec<QuestionInput> {
        (0..count)
            .map(|i| QuestionInput {
                question_number: i as i32 + 1,
                question_text: format!("What is {} + {}?", i, i),
                options: (0..4).map(|o| (i * 2 + o).to_string()).collect(),
                correct_option: 0,
                score: 1,
            })
            .collect()
    }

    #[test]
    fn pool_below_minimum_is_rejected() {
        assert!(matches!(
            validate_pool(&questions(15), &definition()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn one_short_option_list_rejects_the_pool() {
        let mut pool = questions(25);
        pool[7].options.pop();
        assert!(matches!(
            validate_pool(&pool, &definition()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn well_formed_pool_is_accepted() {
        assert!(validate_pool(&questions(25), &definition()).is_ok());
    }

    #[test]
    fn pool_above_maximum_is_rejected() {
        assert!(validate_pool(&questions(41), &definition()).is_err());
    }

    #[test]
    fn duplicate_text_and_options_conflict() {
        let mut pool = questions(25);
        pool[3].question_text = pool[2].question_text.clone();
        pool[3].options = pool[2].options.clone();
        assert!(matches!(
            validate_pool(&pool, &definition()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn same_text_with_different_options_is_allowed() {
        let mut pool = questions(25);
        pool[3].question_text = pool[2].question_text.clone();
        assert!(validate_pool(&pool, &definition()).is_ok());
    }

    #[test]
    fn correct_option_must_exist() {
        let mut pool = questions(25);
        pool[0].correct_option = 4;
        assert!(matches!(
            validate_pool(&pool, &definition()),
            Err(AppError::ValidationError(_))
        ));
    }
}
