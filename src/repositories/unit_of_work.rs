use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::doc,
    options::ReplaceOptions,
    ClientSession, Collection,
};

use crate::{
    db::{collections, is_duplicate_key, Database},
    errors::{AppError, AppResult},
    models::domain::{
        AttemptKey, AttemptStatus, ExamAttempt, ParticipationSet, QuestionSet, StudentResult,
        SubjectExamKey, SubjectResult, Term, Timetable,
    },
    repositories::{
        exam_attempt_repository::attempt_key_filter,
        question_set_repository::key_filter,
        result_repository::{student_result_filter, subject_result_filter},
    },
};

/// An all-or-nothing batch of writes. Dropping a unit of work without calling
/// `commit` discards everything staged on it.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_timetable(
        &mut self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>>;
    async fn insert_timetable(&mut self, timetable: &Timetable) -> AppResult<()>;
    /// Flips `is_subject_question_set` on one timetable entry.
    async fn mark_question_set_bound(&mut self, timetable_id: &str, subject_id: &str) -> AppResult<()>;
    /// Set-union into one participation set of one timetable entry.
    async fn add_participants(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        set: ParticipationSet,
        student_ids: &[String],
    ) -> AppResult<()>;
    /// Pull from `started` and add to `submitted` in one write.
    async fn move_started_to_submitted(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        student_id: &str,
    ) -> AppResult<()>;

    async fn find_question_set(&mut self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>>;
    /// Inserts, or replaces an existing set stored under the same key.
    async fn save_question_set(&mut self, set: &QuestionSet) -> AppResult<()>;
    async fn add_allowed_students(&mut self, key: &SubjectExamKey, student_ids: &[String]) -> AppResult<()>;

    async fn find_attempt(&mut self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>>;
    async fn find_attempt_by_id(&mut self, attempt_id: &str) -> AppResult<Option<ExamAttempt>>;
    /// Fails with `Conflict` when an attempt already exists for the key.
    async fn insert_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<()>;
    /// Replaces the stored attempt only while it is still `in_progress`.
    /// Returns false when it has already been closed.
    async fn close_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<bool>;

    async fn find_subject_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>>;
    async fn save_subject_result(&mut self, result: &SubjectResult) -> AppResult<()>;
    async fn find_student_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>>;
    async fn save_student_result(&mut self, result: &StudentResult) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn abort(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

#[derive(Clone)]
struct TransactionCollections {
    timetables: Collection<Timetable>,
    question_sets: Collection<QuestionSet>,
    attempts: Collection<ExamAttempt>,
    subject_results: Collection<SubjectResult>,
    student_results: Collection<StudentResult>,
}

pub struct MongoTransactionManager {
    db: Database,
    collections: TransactionCollections,
}

impl MongoTransactionManager {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            collections: TransactionCollections {
                timetables: db.get_collection(collections::TIMETABLES),
                question_sets: db.get_collection(collections::QUESTION_SETS),
                attempts: db.get_collection(collections::ATTEMPTS),
                subject_results: db.get_collection(collections::SUBJECT_RESULTS),
                student_results: db.get_collection(collections::STUDENT_RESULTS),
            },
        }
    }
}

#[async_trait]
impl TransactionManager for MongoTransactionManager {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let session = self.db.start_transaction().await?;
        Ok(Box::new(MongoUnitOfWork {
            session,
            collections: self.collections.clone(),
        }))
    }
}

/// Unit of work backed by a MongoDB client-session transaction.
pub struct MongoUnitOfWork {
    session: ClientSession,
    collections: TransactionCollections,
}

fn participant_path(set: ParticipationSet) -> String {
    format!("scheduled_subjects.$.{}", set.field_name())
}

fn upsert() -> ReplaceOptions {
    ReplaceOptions::builder().upsert(true).build()
}

#[async_trait]
impl UnitOfWork for MongoUnitOfWork {
    async fn find_timetable(
        &mut self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>> {
        let timetable = self
            .collections
            .timetables
            .find_one(doc! {
                "class_id": class_id,
                "academic_session_id": academic_session_id,
                "term": term.as_str(),
            })
            .session(&mut self.session)
            .await?;
        Ok(timetable)
    }

    async fn insert_timetable(&mut self, timetable: &Timetable) -> AppResult<()> {
        match self
            .collections
            .timetables
            .insert_one(timetable)
            .session(&mut self.session)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(
                "A timetable already exists for this class and term".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_question_set_bound(&mut self, timetable_id: &str, subject_id: &str) -> AppResult<()> {
        let result = self
            .collections
            .timetables
            .update_one(
                doc! { "id": timetable_id, "scheduled_subjects.subject_id": subject_id },
                doc! { "$set": { "scheduled_subjects.$.is_subject_question_set": true } },
            )
            .session(&mut self.session)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Subject {} in timetable {}",
                subject_id, timetable_id
            )));
        }
        Ok(())
    }

    async fn add_participants(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        set: ParticipationSet,
        student_ids: &[String],
    ) -> AppResult<()> {
        let mut add = mongodb::bson::Document::new();
        add.insert(participant_path(set), doc! { "$each": student_ids.to_vec() });

        let result = self
            .collections
            .timetables
            .update_one(
                doc! { "id": timetable_id, "scheduled_subjects.subject_id": subject_id },
                doc! { "$addToSet": add },
            )
            .session(&mut self.session)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Subject {} in timetable {}",
                subject_id, timetable_id
            )));
        }
        Ok(())
    }

    async fn move_started_to_submitted(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        student_id: &str,
    ) -> AppResult<()> {
        let mut pull = mongodb::bson::Document::new();
        pull.insert(participant_path(ParticipationSet::Started), student_id);
        let mut add = mongodb::bson::Document::new();
        add.insert(participant_path(ParticipationSet::Submitted), student_id);

        self.collections
            .timetables
            .update_one(
                doc! { "id": timetable_id, "scheduled_subjects.subject_id": subject_id },
                doc! { "$pull": pull, "$addToSet": add },
            )
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn find_question_set(&mut self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>> {
        let set = self
            .collections
            .question_sets
            .find_one(key_filter(key))
            .session(&mut self.session)
            .await?;
        Ok(set)
    }

    async fn save_question_set(&mut self, set: &QuestionSet) -> AppResult<()> {
        self.collections
            .question_sets
            .replace_one(key_filter(&set.key()), set)
            .with_options(upsert())
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn add_allowed_students(&mut self, key: &SubjectExamKey, student_ids: &[String]) -> AppResult<()> {
        let result = self
            .collections
            .question_sets
            .update_one(
                key_filter(key),
                doc! { "$addToSet": { "allowed_students": { "$each": student_ids.to_vec() } } },
            )
            .session(&mut self.session)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound("Question set".to_string()));
        }
        Ok(())
    }

    async fn find_attempt(&mut self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>> {
        let attempt = self
            .collections
            .attempts
            .find_one(attempt_key_filter(key))
            .session(&mut self.session)
            .await?;
        Ok(attempt)
    }

    async fn find_attempt_by_id(&mut self, attempt_id: &str) -> AppResult<Option<ExamAttempt>> {
        let attempt = self
            .collections
            .attempts
            .find_one(doc! { "id": attempt_id })
            .session(&mut self.session)
            .await?;
        Ok(attempt)
    }

    async fn insert_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<()> {
        match self
            .collections
            .attempts
            .insert_one(attempt)
            .session(&mut self.session)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(
                "An attempt already exists for this subject".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn close_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<bool> {
        let mut closed = attempt.clone();
        closed.modified_at = Some(Utc::now());

        let result = self
            .collections
            .attempts
            .replace_one(
                doc! { "id": &attempt.id, "obj_status": AttemptStatus::InProgress.as_str() },
                &closed,
            )
            .session(&mut self.session)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn find_subject_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>> {
        let result = self
            .collections
            .subject_results
            .find_one(subject_result_filter(student_id, class_id, academic_session_id, subject_id))
            .session(&mut self.session)
            .await?;
        Ok(result)
    }

    async fn save_subject_result(&mut self, result: &SubjectResult) -> AppResult<()> {
        self.collections
            .subject_results
            .replace_one(doc! { "id": &result.id }, result)
            .with_options(upsert())
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn find_student_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>> {
        let result = self
            .collections
            .student_results
            .find_one(student_result_filter(student_id, class_id, academic_session_id))
            .session(&mut self.session)
            .await?;
        Ok(result)
    }

    async fn save_student_result(&mut self, result: &StudentResult) -> AppResult<()> {
        self.collections
            .student_results
            .replace_one(doc! { "id": &result.id }, result)
            .with_options(upsert())
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = *self;
        this.session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        let mut this = *self;
        this.session.abort_transaction().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_paths_use_positional_operator() {
        assert_eq!(
            participant_path(ParticipationSet::Started),
            "scheduled_subjects.$.students_that_have_started"
        );
        assert_eq!(
            participant_path(ParticipationSet::Authorized),
            "scheduled_subjects.$.authorized_students"
        );
    }
}
