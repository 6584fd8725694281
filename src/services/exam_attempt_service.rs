use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    config::CutoffPolicy,
    errors::{AppError, AppResult},
    models::{
        domain::{
            AnswerUpdate, AttemptKey, AttemptState, AttemptStatus, ExamAttempt, ParticipationSet,
            SubjectExamKey, Term, TriggerType,
        },
        dto::{
            request::{
                into_answer_updates, ForceEndRequest, StartExamRequest, SubmitExamRequest,
                UpdateAnswersRequest, UpdateTimeRequest,
            },
            response::{AttemptView, SubmissionOutcome, SyncAck},
        },
    },
    repositories::{
        ExamAttemptRepository, ExamDefinitionRepository, QuestionSetRepository, SchoolDirectory,
        TransactionManager,
    },
    services::{
        clock::Clock,
        sampling::{sample_questions, SeedSource},
        scoring_service::ScoringService,
    },
};

fn ensure_within(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    action: &str,
) -> AppResult<()> {
    if now < start {
        return Err(AppError::too_early(
            format!("Too early to {}; the exam has not started", action),
            start,
        ));
    }
    if now > end {
        return Err(AppError::too_late(
            format!("Too late to {}; the exam window has closed", action),
            end,
        ));
    }
    Ok(())
}

fn ensure_in_progress(attempt: &ExamAttempt) -> AppResult<()> {
    if attempt.obj_status != AttemptStatus::InProgress {
        return Err(AppError::InvalidState(format!(
            "This exam has already been {}",
            attempt.obj_status.as_str().replace('_', " ")
        )));
    }
    Ok(())
}

pub struct ExamAttemptService {
    attempts: Arc<dyn ExamAttemptRepository>,
    question_sets: Arc<dyn QuestionSetRepository>,
    exam_definitions: Arc<dyn ExamDefinitionRepository>,
    directory: Arc<dyn SchoolDirectory>,
    transactions: Arc<dyn TransactionManager>,
    scoring: Arc<ScoringService>,
    clock: Arc<dyn Clock>,
    seeds: Arc<dyn SeedSource>,
    cutoffs: CutoffPolicy,
}

impl ExamAttemptService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attempts: Arc<dyn ExamAttemptRepository>,
        question_sets: Arc<dyn QuestionSetRepository>,
        exam_definitions: Arc<dyn ExamDefinitionRepository>,
        directory: Arc<dyn SchoolDirectory>,
        transactions: Arc<dyn TransactionManager>,
        scoring: Arc<ScoringService>,
        clock: Arc<dyn Clock>,
        seeds: Arc<dyn SeedSource>,
        cutoffs: CutoffPolicy,
    ) -> Self {
        Self {
            attempts,
            question_sets,
            exam_definitions,
            directory,
            transactions,
            scoring,
            clock,
            seeds,
            cutoffs,
        }
    }

    /// Starts (or resumes) the student's attempt for one subject.
    pub async fn start(&self, student_id: &str, request: StartExamRequest) -> AppResult<AttemptView> {
        request.validate()?;

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

        let enrolment = self
            .directory
            .find_enrolment(&request.class_id, &request.academic_session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Class enrolment for this session".to_string()))?;
        if !enrolment.is_enrolled(student_id) {
            return Err(AppError::Unauthorized(
                "You are not enrolled in this class for the session".to_string(),
            ));
        }

        let key = SubjectExamKey {
            exam_id: definition.id.clone(),
            academic_session_id: request.academic_session_id.clone(),
            class_id: request.class_id.clone(),
            subject_id: request.subject_id.clone(),
            term: request.term,
        };
        let question_set = self.question_sets.find_by_key(&key).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "No questions have been set for subject {}",
                request.subject_id
            ))
        })?;
        if !question_set.is_student_allowed(student_id) {
            log::warn!(
                "Student {} tried to start subject {} without authorization",
                student_id,
                request.subject_id
            );
            return Err(AppError::Unauthorized(
                "You have not been authorized to take this exam".to_string(),
            ));
        }

        let now = self.clock.now();
        ensure_within(
            now,
            question_set.window.start_time,
            question_set.window.final_cutoff_time,
            "start this exam",
        )?;

        let attempt_key = AttemptKey {
            exam_id: definition.id.clone(),
            subject_id: request.subject_id.clone(),
            class_id: request.class_id.clone(),
            student_id: student_id.to_string(),
        };
        if let Some(existing) = self.attempts.find_by_key(&attempt_key).await? {
            ensure_in_progress(&existing)?;
            log::info!("Student {} resumed attempt {}", student_id, existing.id);
            return Ok(AttemptView::from(&existing));
        }

        let seed = self.seeds.next_seed();
        let questions = sample_questions(
            &question_set.obj_questions,
            definition.number_of_questions_per_student.max(0) as usize,
            seed,
        )?;
        let attempt = ExamAttempt::start(&question_set, student_id, questions, seed, now);

        let mut uow = self.transactions.begin().await?;
        if let Some(existing) = uow.find_attempt(&attempt_key).await? {
            uow.abort().await?;
            ensure_in_progress(&existing)?;
            return Ok(AttemptView::from(&existing));
        }
        uow.insert_attempt(&attempt).await?;
        if let Some(timetable) = uow
            .find_timetable(&request.class_id, &request.academic_session_id, request.term)
            .await?
        {
            uow.add_participants(
                &timetable.id,
                &request.subject_id,
                ParticipationSet::Started,
                &[student_id.to_string()],
            )
            .await?;
        }
        uow.commit().await?;

        log::info!(
            "Student {} started attempt {} for subject {} with {} questions",
            student_id,
            attempt.id,
            attempt.subject_id,
            attempt.shuffled_obj_questions.len()
        );
        Ok(AttemptView::from(&attempt))
    }

    async fn owned_attempt(&self, student_id: &str, attempt_id: &str) -> AppResult<ExamAttempt> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {}", attempt_id)))?;
        if attempt.student_id != student_id {
            return Err(AppError::Unauthorized(
                "This attempt belongs to another student".to_string(),
            ));
        }
        Ok(attempt)
    }

    /// Answer checkpoint. Unknown question ids are dropped silently.
    pub async fn sync_answers(
        &self,
        student_id: &str,
        request: UpdateAnswersRequest,
    ) -> AppResult<SyncAck> {
        request.validate()?;

        let attempt = self.owned_attempt(student_id, &request.attempt_id).await?;
        ensure_in_progress(&attempt)?;
        ensure_within(
            self.clock.now(),
            attempt.window.start_time,
            attempt.window.final_cutoff_time,
            "save answers",
        )?;

        let known: HashSet<&str> = attempt
            .shuffled_obj_questions
            .iter()
            .map(|q| q.question_id.as_str())
            .collect();
        let updates: Vec<AnswerUpdate> = into_answer_updates(request.answers)
            .into_iter()
            .filter(|a| known.contains(a.question_id.as_str()))
            .collect();

        if !updates.is_empty() && !self.attempts.apply_answers(&attempt.id, &updates).await? {
            return Err(AppError::InvalidState(
                "This exam is no longer in progress".to_string(),
            ));
        }

        Ok(SyncAck {
            attempt_id: attempt.id,
            applied: updates.len(),
        })
    }

    /// Stores the client's remaining-time counter. Never used as a deadline.
    pub async fn sync_time(&self, student_id: &str, request: UpdateTimeRequest) -> AppResult<SyncAck> {
        request.validate()?;

        let attempt = self.owned_attempt(student_id, &request.attempt_id).await?;
        ensure_in_progress(&attempt)?;
        ensure_within(
            self.clock.now(),
            attempt.window.start_time,
            attempt.window.final_cutoff_time,
            "update the timer",
        )?;

        if !self
            .attempts
            .set_time_left(&attempt.id, request.remaining_time)
            .await?
        {
            return Err(AppError::InvalidState(
                "This exam is no longer in progress".to_string(),
            ));
        }

        Ok(SyncAck {
            attempt_id: attempt.id,
            applied: 1,
        })
    }

    pub async fn submit(
        &self,
        student_id: &str,
        request: SubmitExamRequest,
    ) -> AppResult<SubmissionOutcome> {
        request.validate()?;

        let attempt = self.owned_attempt(student_id, &request.attempt_id).await?;
        let answers = into_answer_updates(request.answers);
        self.close(attempt, &answers, request.trigger_type, request.time_left)
            .await
    }

    /// Administrative close of a student's attempt once its window has passed.
    pub async fn force_end(&self, request: ForceEndRequest) -> AppResult<SubmissionOutcome> {
        request.validate()?;

        let attempt = self
            .attempts
            .find_by_id(&request.attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {}", request.attempt_id)))?;
        self.close(attempt, &[], TriggerType::ForcedClose, None).await
    }

    async fn close(
        &self,
        attempt: ExamAttempt,
        answers: &[AnswerUpdate],
        trigger: TriggerType,
        time_left: Option<i64>,
    ) -> AppResult<SubmissionOutcome> {
        ensure_in_progress(&attempt)?;

        let now = self.clock.now();
        let window = attempt.window;
        ensure_within(
            now,
            window.start_time,
            window.submission_deadline(self.cutoffs.grace_period()),
            "submit this exam",
        )?;
        if trigger == TriggerType::ForcedClose && now < window.final_cutoff_time {
            return Err(AppError::too_early(
                "The exam is still within its window and cannot be force-ended",
                window.final_cutoff_time,
            ));
        }

        self.scoring.finalize(&attempt, answers, trigger, time_left).await
    }

    pub async fn get_attempt(&self, student_id: &str, attempt_id: &str) -> AppResult<AttemptView> {
        let attempt = self.owned_attempt(student_id, attempt_id).await?;
        Ok(AttemptView::from(&attempt))
    }

    /// Where the student stands for one subject; `NotStarted` when no attempt exists.
    pub async fn attempt_state(
        &self,
        student_id: &str,
        academic_session_id: &str,
        class_id: &str,
        subject_id: &str,
        term: Term,
    ) -> AppResult<AttemptState> {
        let Some(definition) = self
            .exam_definitions
            .find_by_session_term(academic_session_id, term)
            .await?
        else {
            return Ok(AttemptState::NotStarted);
        };

        let record = self
            .attempts
            .find_by_key(&AttemptKey {
                exam_id: definition.id,
                subject_id: subject_id.to_string(),
                class_id: class_id.to_string(),
                student_id: student_id.to_string(),
            })
            .await?;
        Ok(AttemptState::from_record(record))
    }
}
