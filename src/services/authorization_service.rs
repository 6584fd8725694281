use std::{collections::HashSet, sync::Arc};

use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{ParticipationSet, SubjectExamKey},
        dto::{request::AuthorizeStudentsRequest, response::AuthorizationOutcome},
    },
    repositories::{
        ExamDefinitionRepository, QuestionSetRepository, SchoolDirectory, TimetableRepository,
        TransactionManager,
    },
    services::clock::Clock,
};

pub struct AuthorizationService {
    question_sets: Arc<dyn QuestionSetRepository>,
    timetables: Arc<dyn TimetableRepository>,
    exam_definitions: Arc<dyn ExamDefinitionRepository>,
    directory: Arc<dyn SchoolDirectory>,
    transactions: Arc<dyn TransactionManager>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationService {
    pub fn new(
        question_sets: Arc<dyn QuestionSetRepository>,
        timetables: Arc<dyn TimetableRepository>,
        exam_definitions: Arc<dyn ExamDefinitionRepository>,
        directory: Arc<dyn SchoolDirectory>,
        transactions: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            question_sets,
            timetables,
            exam_definitions,
            directory,
            transactions,
            clock,
        }
    }

    /// Grants the named students permission to start one subject's exam.
    /// Only the class teacher may call this, and only inside the exam window.
    pub async fn authorize_students(
        &self,
        teacher_id: &str,
        class_id: &str,
        request: AuthorizeStudentsRequest,
    ) -> AppResult<AuthorizationOutcome> {
        request.validate()?;

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = request
            .student_ids
            .iter()
            .filter(|id| !seen.insert(id.as_str()))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Duplicate student ids: {}",
                duplicates.join(", ")
            )));
        }

        let class = self
            .directory
            .find_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {}", class_id)))?;
        if !class.is_class_teacher(teacher_id) {
            log::warn!(
                "Teacher {} tried to authorize students in class {} without being its class teacher",
                teacher_id,
                class_id
            );
            return Err(AppError::Unauthorized(format!(
                "Only the class teacher of {} can authorize students",
                class.name
            )));
        }

        let enrolment = self
            .directory
            .find_enrolment(class_id, &request.academic_session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "There is no enrolment into {} in this session",
                    class.name
                ))
            })?;
        let not_enrolled: Vec<&str> = request
            .student_ids
            .iter()
            .filter(|id| !enrolment.is_enrolled(id))
            .map(String::as_str)
            .collect();
        if !not_enrolled.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Students not enrolled in {}: {}",
                class.name,
                not_enrolled.join(", ")
            )));
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
            .ok_or_else(|| {
                AppError::NotFound(format!("{} has no exam timetable for {}", class.name, request.term))
            })?;

        let key = SubjectExamKey {
            exam_id: definition.id.clone(),
            academic_session_id: request.academic_session_id.clone(),
            class_id: class_id.to_string(),
            subject_id: request.subject_id.clone(),
            term: request.term,
        };
        let question_set = self.question_sets.find_by_key(&key).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No questions have been set for subject {}",
                request.subject_id
            ))
        })?;

        let now = self.clock.now();
        let window = question_set.window;
        if !window.has_started(now) {
            return Err(AppError::too_early(
                "The exam for this subject has not started yet",
                window.start_time,
            ));
        }
        if now > window.final_cutoff_time {
            return Err(AppError::too_late(
                "The exam for this subject is already late",
                window.final_cutoff_time,
            ));
        }

        let (already_authorized, newly_authorized): (Vec<String>, Vec<String>) = request
            .student_ids
            .into_iter()
            .partition(|id| question_set.is_student_allowed(id));
        if newly_authorized.is_empty() {
            return Err(AppError::Conflict(
                "All the named students have already been authorized".to_string(),
            ));
        }

        let mut uow = self.transactions.begin().await?;
        uow.add_allowed_students(&key, &newly_authorized).await?;
        uow.add_participants(
            &timetable.id,
            &request.subject_id,
            ParticipationSet::Authorized,
            &newly_authorized,
        )
        .await?;
        uow.commit().await?;

        log::info!(
            "Authorized {} students for subject {} in class {}",
            newly_authorized.len(),
            request.subject_id,
            class_id
        );
        Ok(AuthorizationOutcome {
            subject_id: request.subject_id,
            newly_authorized,
            already_authorized,
        })
    }
}
