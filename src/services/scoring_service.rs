use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{
            AnswerUpdate, AttemptStatus, ExamAttempt, RecomputationKey, ScoreEntry, StudentResult,
            SubjectResult, TriggerType,
        },
        dto::response::SubmissionOutcome,
    },
    repositories::{SchoolDirectory, TransactionManager},
    services::{clock::Clock, recomputation_dispatcher::RecomputationDispatcher},
};

/// Marks every question and returns (raw score, maximum attainable score).
pub fn grade(attempt: &mut ExamAttempt) -> (i32, i32) {
    let mut raw = 0;
    let mut max = 0;
    for question in attempt.shuffled_obj_questions.iter_mut() {
        let correct = question.selected_answer.as_deref() == Some(question.correct_answer.as_str());
        let awarded = if correct { question.score } else { 0 };
        question.student_score = Some(awarded);
        raw += awarded;
        max += question.score;
    }
    (raw, max)
}

/// `raw / max * weight`, kept inside `[0, weight]`. An empty paper contributes nothing.
pub fn weighted_contribution(raw: i32, max: i32, weight: f64) -> f64 {
    if max <= 0 || weight <= 0.0 {
        return 0.0;
    }
    let weighted = f64::from(raw) / f64::from(max) * weight;
    weighted.clamp(0.0, weight)
}

fn raw_percentage(raw: i32, max: i32) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    f64::from(raw) / f64::from(max) * 100.0
}

pub struct ScoringService {
    directory: Arc<dyn SchoolDirectory>,
    transactions: Arc<dyn TransactionManager>,
    dispatcher: RecomputationDispatcher,
    clock: Arc<dyn Clock>,
}

impl ScoringService {
    pub fn new(
        directory: Arc<dyn SchoolDirectory>,
        transactions: Arc<dyn TransactionManager>,
        dispatcher: RecomputationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            transactions,
            dispatcher,
            clock,
        }
    }

    /// Grades an in-progress attempt and records the weighted score in the
    /// subject and student result records. The attempt is re-read inside the
    /// unit of work, so answers synced after `loaded` was fetched are graded
    /// too, and a re-delivered submission never counts twice.
    pub async fn finalize(
        &self,
        loaded: &ExamAttempt,
        answers: &[AnswerUpdate],
        trigger: TriggerType,
        time_left: Option<i64>,
    ) -> AppResult<SubmissionOutcome> {
        let setting = self
            .directory
            .find_result_setting(&loaded.level)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Result setting for level {}", loaded.level))
            })?;
        let component = setting.objective_component().ok_or_else(|| {
            AppError::NotFound(format!(
                "Result setting for level {} has no objective component",
                loaded.level
            ))
        })?;

        let now = self.clock.now();
        let mut uow = self.transactions.begin().await?;
        let mut attempt = match uow.find_attempt_by_id(&loaded.id).await? {
            Some(attempt) if attempt.obj_status == AttemptStatus::InProgress => attempt,
            Some(_) => {
                uow.abort().await?;
                return Err(AppError::InvalidState(
                    "This exam has already been submitted".to_string(),
                ));
            }
            None => {
                uow.abort().await?;
                return Err(AppError::NotFound(format!("Attempt {}", loaded.id)));
            }
        };

        attempt.apply_answers(answers);
        let (raw, max) = grade(&mut attempt);
        let weighted = weighted_contribution(raw, max, component.percentage);
        let percentage = raw_percentage(raw, max);

        attempt.obj_status = trigger.resulting_status();
        attempt.obj_trigger_type = Some(trigger);
        attempt.obj_submitted_at = Some(now);
        attempt.objective_total_score = Some(raw);
        attempt.percent_score = Some(percentage);
        if let Some(seconds) = time_left {
            attempt.obj_time_left = seconds;
        }

        let entry = ScoreEntry {
            key: component.key.clone(),
            score_name: component.name.clone(),
            score: weighted,
        };

        if !uow.close_attempt(&attempt).await? {
            uow.abort().await?;
            return Err(AppError::InvalidState(
                "This exam has already been submitted".to_string(),
            ));
        }

        let mut subject_result = match uow
            .find_subject_result(
                &attempt.student_id,
                &attempt.class_id,
                &attempt.academic_session_id,
                &attempt.subject_id,
            )
            .await?
        {
            Some(result) => result,
            None => SubjectResult::new(
                &attempt.student_id,
                &attempt.class_id,
                &attempt.academic_session_id,
                &attempt.subject_id,
            ),
        };
        if subject_result.record_exam_score(attempt.term, &entry) {
            uow.save_subject_result(&subject_result).await?;
        } else {
            log::warn!(
                "{} score already recorded for student {} subject {}; leaving subject result unchanged",
                entry.score_name,
                attempt.student_id,
                attempt.subject_id
            );
        }

        let mut student_result = match uow
            .find_student_result(&attempt.student_id, &attempt.class_id, &attempt.academic_session_id)
            .await?
        {
            Some(result) => result,
            None => StudentResult::new(
                &attempt.student_id,
                &attempt.class_id,
                &attempt.academic_session_id,
            ),
        };
        if student_result.record_exam_score(
            attempt.term,
            &attempt.subject_id,
            &attempt.subject_teacher_id,
            &entry,
        ) {
            uow.save_student_result(&student_result).await?;
        }

        if let Some(timetable) = uow
            .find_timetable(&attempt.class_id, &attempt.academic_session_id, attempt.term)
            .await?
        {
            uow.move_started_to_submitted(&timetable.id, &attempt.subject_id, &attempt.student_id)
                .await?;
        }
        uow.commit().await?;

        log::info!(
            "Attempt {} {} by {:?}: {}/{} ({:.2} weighted)",
            attempt.id,
            attempt.obj_status.as_str(),
            trigger,
            raw,
            max,
            weighted
        );

        self.dispatcher.dispatch(RecomputationKey {
            student_id: attempt.student_id.clone(),
            subject_id: attempt.subject_id.clone(),
            class_id: attempt.class_id.clone(),
            academic_session_id: attempt.academic_session_id.clone(),
            term: attempt.term,
        });

        Ok(SubmissionOutcome {
            attempt_id: attempt.id,
            raw_score: raw,
            max_score: max,
            raw_percentage: percentage,
            weighted_score: weighted,
            status: attempt.obj_status,
            trigger,
            submitted_at: now,
        })
    }
}
