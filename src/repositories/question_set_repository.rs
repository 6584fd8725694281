use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::{QuestionSet, SubjectExamKey},
};

#[async_trait]
pub trait QuestionSetRepository: Send + Sync {
    async fn find_by_key(&self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>>;
}

pub struct MongoQuestionSetRepository {
    collection: Collection<QuestionSet>,
}

impl MongoQuestionSetRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(collections::QUESTION_SETS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for {} collection", collections::QUESTION_SETS);

        let key_index = IndexModel::builder()
            .keys(doc! {
                "exam_id": 1,
                "academic_session_id": 1,
                "class_id": 1,
                "subject_id": 1,
                "term": 1,
            })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("subject_exam_key_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(key_index).await?;

        log::info!("Successfully created indexes for {} collection", collections::QUESTION_SETS);
        Ok(())
    }
}

pub(crate) fn key_filter(key: &SubjectExamKey) -> mongodb::bson::Document {
    doc! {
        "exam_id": &key.exam_id,
        "academic_session_id": &key.academic_session_id,
        "class_id": &key.class_id,
        "subject_id": &key.subject_id,
        "term": key.term.as_str(),
    }
}

#[async_trait]
impl QuestionSetRepository for MongoQuestionSetRepository {
    async fn find_by_key(&self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>> {
        let set = self.collection.find_one(key_filter(key)).await?;
        Ok(set)
    }
}
