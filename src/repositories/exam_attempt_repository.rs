use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, to_bson, Bson, Document},
    options::{IndexOptions, UpdateOptions},
    Collection, IndexModel,
};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::{AnswerUpdate, AttemptKey, AttemptStatus, ExamAttempt},
};

/// Single-document attempt access. Writes here only touch `in_progress` attempts
/// and report `false` when the attempt was already closed.
#[async_trait]
pub trait ExamAttemptRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>>;
    async fn find_by_key(&self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>>;
    /// Overwrites `selected_answer` per question id. Each answer is its own
    /// array-element update, so concurrent syncs of distinct questions never
    /// overwrite each other.
    async fn apply_answers(&self, attempt_id: &str, answers: &[AnswerUpdate]) -> AppResult<bool>;
    async fn set_time_left(&self, attempt_id: &str, seconds: i64) -> AppResult<bool>;
}

pub struct MongoExamAttemptRepository {
    collection: Collection<ExamAttempt>,
}

impl MongoExamAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(collections::ATTEMPTS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for {} collection", collections::ATTEMPTS);

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let attempt_key_index = IndexModel::builder()
            .keys(doc! { "exam_id": 1, "student_id": 1, "subject_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("exam_student_subject_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(attempt_key_index).await?;

        log::info!("Successfully created indexes for {} collection", collections::ATTEMPTS);
        Ok(())
    }
}

pub(crate) fn attempt_key_filter(key: &AttemptKey) -> Document {
    doc! {
        "exam_id": &key.exam_id,
        "subject_id": &key.subject_id,
        "class_id": &key.class_id,
        "student_id": &key.student_id,
    }
}

fn in_progress_filter(attempt_id: &str) -> Document {
    doc! { "id": attempt_id, "obj_status": AttemptStatus::InProgress.as_str() }
}

/// Builds the `$set` document and its array filters. Repeated question ids
/// collapse to the last value.
fn answer_update(answers: &[AnswerUpdate]) -> AppResult<(Document, Vec<Document>)> {
    let mut latest: Vec<&AnswerUpdate> = Vec::with_capacity(answers.len());
    for answer in answers {
        match latest.iter().position(|a| a.question_id == answer.question_id) {
            Some(index) => latest[index] = answer,
            None => latest.push(answer),
        }
    }

    let mut set = Document::new();
    let mut array_filters = Vec::with_capacity(latest.len());
    for (index, answer) in latest.iter().enumerate() {
        let ident = format!("q{}", index);
        let value = match &answer.selected_answer {
            Some(selected) => Bson::String(selected.clone()),
            None => Bson::Null,
        };
        set.insert(format!("shuffled_obj_questions.$[{}].selected_answer", ident), value);
        let mut filter = Document::new();
        filter.insert(format!("{}.question_id", ident), answer.question_id.clone());
        array_filters.push(filter);
    }
    set.insert("modified_at", to_bson(&Utc::now())?);

    Ok((set, array_filters))
}

#[async_trait]
impl ExamAttemptRepository for MongoExamAttemptRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn find_by_key(&self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>> {
        let attempt = self.collection.find_one(attempt_key_filter(key)).await?;
        Ok(attempt)
    }

    async fn apply_answers(&self, attempt_id: &str, answers: &[AnswerUpdate]) -> AppResult<bool> {
        if answers.is_empty() {
            let exists = self
                .collection
                .count_documents(in_progress_filter(attempt_id))
                .await?;
            return Ok(exists > 0);
        }

        let (set, array_filters) = answer_update(answers)?;
        let options = UpdateOptions::builder()
            .array_filters(array_filters)
            .build();

        let result = self
            .collection
            .update_one(in_progress_filter(attempt_id), doc! { "$set": set })
            .with_options(options)
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn set_time_left(&self, attempt_id: &str, seconds: i64) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                in_progress_filter(attempt_id),
                doc! {
                    "$set": {
                        "obj_time_left": seconds,
                        "modified_at": to_bson(&Utc::now())?,
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }
}
