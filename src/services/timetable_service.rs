use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use validator::Validate;

use crate::{
    config::CutoffPolicy,
    errors::{AppError, AppResult},
    models::{
        domain::{Term, Timetable, TimetableEntry},
        dto::request::{CreateTimetableRequest, ScheduleSlotRequest},
    },
    repositories::{
        ExamDefinitionRepository, SchoolDirectory, TimetableRepository, TransactionManager,
    },
    services::clock::Clock,
};

/// Checks a proposed schedule against the slot rules:
/// no repeated subject, no repeated start time, nothing in the past, and on
/// each calendar day (UTC) every slot starts no earlier than the previous
/// slot's start + duration + `buffer`.
pub fn validate_schedule(
    slots: &[ScheduleSlotRequest],
    now: DateTime<Utc>,
    buffer: Duration,
) -> AppResult<()> {
    let mut subjects = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for slot in slots {
        if !subjects.insert(slot.subject_id.as_str()) && !duplicates.contains(&slot.subject_id.as_str()) {
            duplicates.push(&slot.subject_id);
        }
    }
    if !duplicates.is_empty() {
        return Err(AppError::Conflict(format!(
            "Duplicate subject found for: {}",
            duplicates.join(", ")
        )));
    }

    let mut start_times = HashSet::new();
    for slot in slots {
        if !start_times.insert(slot.start_time) {
            return Err(AppError::Conflict(format!(
                "Duplicate time slot detected at {}",
                slot.start_time.to_rfc3339()
            )));
        }
    }

    for slot in slots {
        if slot.theory_start_time.is_some() != slot.theory_duration.is_some() {
            return Err(AppError::ValidationError(format!(
                "Theory start time and duration for subject {} must be given together",
                slot.subject_id
            )));
        }
    }

    let mut by_day: BTreeMap<NaiveDate, Vec<&ScheduleSlotRequest>> = BTreeMap::new();
    for slot in slots {
        if slot.start_time < now {
            return Err(AppError::SchedulingViolation {
                message: format!("Subject {} is scheduled in the past", slot.subject_id),
                subject_id: Some(slot.subject_id.clone()),
                earliest_start: Some(now),
            });
        }
        by_day.entry(slot.start_time.date_naive()).or_default().push(slot);
    }

    for day in by_day.values_mut() {
        day.sort_by_key(|slot| slot.start_time);
        for pair in day.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let earliest = Duration::try_seconds(current.duration)
                .and_then(|length| current.start_time.checked_add_signed(length))
                .and_then(|end| end.checked_add_signed(buffer))
                .ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Duration of subject {} is out of range",
                        current.subject_id
                    ))
                })?;
            if next.start_time < earliest {
                return Err(AppError::SchedulingViolation {
                    message: format!(
                        "Subject {} can only be set to start from {}",
                        next.subject_id,
                        earliest.to_rfc3339()
                    ),
                    subject_id: Some(next.subject_id.clone()),
                    earliest_start: Some(earliest),
                });
            }
        }
    }

    Ok(())
}

pub struct TimetableService {
    timetables: Arc<dyn TimetableRepository>,
    exam_definitions: Arc<dyn ExamDefinitionRepository>,
    directory: Arc<dyn SchoolDirectory>,
    transactions: Arc<dyn TransactionManager>,
    clock: Arc<dyn Clock>,
    cutoffs: CutoffPolicy,
}

impl TimetableService {
    pub fn new(
        timetables: Arc<dyn TimetableRepository>,
        exam_definitions: Arc<dyn ExamDefinitionRepository>,
        directory: Arc<dyn SchoolDirectory>,
        transactions: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
        cutoffs: CutoffPolicy,
    ) -> Self {
        Self {
            timetables,
            exam_definitions,
            directory,
            transactions,
            clock,
            cutoffs,
        }
    }

    pub async fn create_timetable(
        &self,
        class_id: &str,
        request: CreateTimetableRequest,
    ) -> AppResult<Timetable> {
        request.validate()?;
        validate_schedule(&request.timetable, self.clock.now(), self.cutoffs.buffer())?;

        let session = self
            .directory
            .find_session(&request.academic_session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Academic session {}", request.academic_session_id))
            })?;
        if !session.is_term_active(request.term) {
            return Err(AppError::InvalidState(format!(
                "{} of session {} is not active",
                request.term, session.name
            )));
        }

        let class = self
            .directory
            .find_class(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {}", class_id)))?;

        if self
            .directory
            .find_enrolment(class_id, &request.academic_session_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "There is no enrolment into {} in this session",
                class.name
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
        if !definition.is_active {
            return Err(AppError::InvalidState(format!(
                "The exam for {} is no longer active",
                request.term
            )));
        }

        let entries = request
            .timetable
            .iter()
            .map(|slot| TimetableEntry {
                theory_start_time: slot.theory_start_time,
                theory_duration: slot.theory_duration,
                ..TimetableEntry::new(&slot.subject_id, slot.start_time, slot.duration)
            })
            .collect();
        let timetable = Timetable::new(
            &definition.id,
            &request.academic_session_id,
            class_id,
            request.term,
            entries,
            self.clock.now(),
        );

        let mut uow = self.transactions.begin().await?;
        if uow
            .find_timetable(class_id, &request.academic_session_id, request.term)
            .await?
            .is_some()
        {
            uow.abort().await?;
            return Err(AppError::Conflict(format!(
                "{} already has an exam timetable for {}",
                class.name, request.term
            )));
        }
        uow.insert_timetable(&timetable).await?;
        uow.commit().await?;

        log::info!(
            "Created {} timetable {} for class {} with {} subjects",
            timetable.term,
            timetable.id,
            class_id,
            timetable.scheduled_subjects.len()
        );
        Ok(timetable)
    }

    pub async fn get_for_term(
        &self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Timetable> {
        self.timetables
            .find_for_class_term(class_id, academic_session_id, term)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Class {} does not have an exam timetable for {}",
                    class_id, term
                ))
            })
    }

    pub async fn list_for_class(&self, class_id: &str) -> AppResult<Vec<Timetable>> {
        self.timetables.list_for_class(class_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 10, hour, minute, 0).unwrap()
    }

    fn slot(subject: &str, start: DateTime<Utc>, minutes: i64) -> ScheduleSlotRequest {
        ScheduleSlotRequest {
            subject_id: subject.to_string(),
            start_time: start,
            duration: minutes * 60,
            theory_start_time: None,
            theory_duration: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap()
    }

    const BUFFER_MINUTES: i64 = 15;

    #[test]
    fn second_subject_inside_buffer_is_rejected_with_earliest_start() {
        let slots = [slot("math", at(9, 0), 60), slot("english", at(9, 50), 60)];
        let err = validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)).unwrap_err();

        match err {
            AppError::SchedulingViolation { subject_id, earliest_start, .. } => {
                assert_eq!(subject_id.as_deref(), Some("english"));
                assert_eq!(earliest_start, Some(at(10, 15)));
            }
            other => panic!("expected scheduling violation, got {:?}", other),
        }
    }

    #[test]
    fn second_subject_at_buffer_boundary_is_accepted() {
        let slots = [slot("math", at(9, 0), 60), slot("english", at(10, 15), 60)];
        assert!(validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)).is_ok());
    }

    #[test]
    fn input_order_does_not_matter() {
        let slots = [slot("english", at(9, 50), 60), slot("math", at(9, 0), 60)];
        assert!(matches!(
            validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::SchedulingViolation { .. })
        ));
    }

    #[test]
    fn different_days_are_checked_independently() {
        let next_day = Utc.with_ymd_and_hms(2030, 6, 11, 9, 5, 0).unwrap();
        let slots = [slot("math", at(9, 0), 60), slot("english", next_day, 60)];
        assert!(validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)).is_ok());
    }

    #[test]
    fn duplicate_subjects_and_start_times_conflict() {
        let dup_subject = [slot("math", at(9, 0), 60), slot("math", at(12, 0), 60)];
        assert!(matches!(
            validate_schedule(&dup_subject, now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::Conflict(_))
        ));

        let dup_time = [slot("math", at(9, 0), 60), slot("english", at(9, 0), 60)];
        assert!(matches!(
            validate_schedule(&dup_time, now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn past_slot_is_a_scheduling_violation() {
        let late_now = at(10, 0);
        let slots = [slot("math", at(9, 0), 60)];
        match validate_schedule(&slots, late_now, Duration::minutes(BUFFER_MINUTES)) {
            Err(AppError::SchedulingViolation { earliest_start, .. }) => {
                assert_eq!(earliest_start, Some(late_now))
            }
            other => panic!("expected scheduling violation, got {:?}", other),
        }
    }

    #[test]
    fn oversized_duration_is_rejected_without_overflow() {
        let mut huge = slot("math", at(9, 0), 60);
        huge.duration = 1_000_000_000_000_000;
        let slots = [huge, slot("english", at(12, 0), 60)];
        assert!(matches!(
            validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::ValidationError(_))
        ));

        let mut near_limit = slot("math", at(9, 0), 60);
        near_limit.duration = i64::MAX / 1000 - 1;
        let slots = [near_limit, slot("english", at(12, 0), 60)];
        assert!(matches!(
            validate_schedule(&slots, now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn theory_fields_travel_together() {
        let mut theory = slot("math", at(9, 0), 60);
        theory.theory_start_time = Some(at(13, 0));
        assert!(matches!(
            validate_schedule(&[theory], now(), Duration::minutes(BUFFER_MINUTES)),
            Err(AppError::ValidationError(_))
        ));
    }
}
