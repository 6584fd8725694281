use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Collection, IndexModel,
};

use crate::{
    db::{collections, is_duplicate_key, Database},
    errors::{AppError, AppResult},
    models::domain::{ExamDefinition, Term},
};

#[async_trait]
pub trait ExamDefinitionRepository: Send + Sync {
    async fn create(&self, definition: ExamDefinition) -> AppResult<ExamDefinition>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamDefinition>>;
    async fn find_by_session_term(
        &self,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<ExamDefinition>>;
    /// Case-insensitive match on title or term name, newest first.
    async fn list(
        &self,
        search: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamDefinition>, i64)>;
    async fn update(&self, definition: ExamDefinition) -> AppResult<ExamDefinition>;
}

pub struct MongoExamDefinitionRepository {
    collection: Collection<ExamDefinition>,
}

impl MongoExamDefinitionRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(collections::EXAM_DEFINITIONS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for {} collection", collections::EXAM_DEFINITIONS);

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let session_term_index = IndexModel::builder()
            .keys(doc! { "academic_session_id": 1, "term": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("session_term_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(session_term_index).await?;

        log::info!("Successfully created indexes for {} collection", collections::EXAM_DEFINITIONS);
        Ok(())
    }
}

fn search_filter(search: Option<&str>) -> Document {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = regex::escape(term);
            doc! {
                "$or": [
                    { "title": { "$regex": &pattern, "$options": "i" } },
                    { "term": { "$regex": &pattern, "$options": "i" } },
                ]
            }
        }
        None => doc! {},
    }
}

#[async_trait]
impl ExamDefinitionRepository for MongoExamDefinitionRepository {
    async fn create(&self, definition: ExamDefinition) -> AppResult<ExamDefinition> {
        match self.collection.insert_one(&definition).await {
            Ok(_) => Ok(definition),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "An exam already exists for {} of this session",
                definition.term
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamDefinition>> {
        let definition = self.collection.find_one(doc! { "id": id }).await?;
        Ok(definition)
    }

    async fn find_by_session_term(
        &self,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<ExamDefinition>> {
        let definition = self
            .collection
            .find_one(doc! {
                "academic_session_id": academic_session_id,
                "term": term.as_str(),
            })
            .await?;
        Ok(definition)
    }

    async fn list(
        &self,
        search: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamDefinition>, i64)> {
        let filter = search_filter(search);
        let total = self.collection.count_documents(filter.clone()).await? as i64;

        let find_options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(Some(offset.max(0) as u64))
            .limit(Some(limit))
            .build();

        let cursor = self.collection.find(filter).with_options(find_options).await?;
        let items: Vec<ExamDefinition> = cursor.try_collect().await?;

        Ok((items, total))
    }

    async fn update(&self, definition: ExamDefinition) -> AppResult<ExamDefinition> {
        let result = self
            .collection
            .replace_one(doc! { "id": &definition.id }, &definition)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Exam {}", definition.id)));
        }
        Ok(definition)
    }
}
