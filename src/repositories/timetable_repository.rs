use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, IndexOptions},
    Collection, IndexModel,
};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::{Term, Timetable},
};

#[async_trait]
pub trait TimetableRepository: Send + Sync {
    async fn find_for_class_term(
        &self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>>;
    async fn list_for_class(&self, class_id: &str) -> AppResult<Vec<Timetable>>;
    async fn exists_for_exam(&self, exam_id: &str) -> AppResult<bool>;
}

pub struct MongoTimetableRepository {
    collection: Collection<Timetable>,
}

impl MongoTimetableRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(collections::TIMETABLES);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for {} collection", collections::TIMETABLES);

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let class_term_index = IndexModel::builder()
            .keys(doc! { "class_id": 1, "academic_session_id": 1, "term": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("class_session_term_unique".to_string())
                    .build(),
            )
            .build();

        let exam_index = IndexModel::builder().keys(doc! { "exam_id": 1 }).build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(class_term_index).await?;
        self.collection.create_index(exam_index).await?;

        log::info!("Successfully created indexes for {} collection", collections::TIMETABLES);
        Ok(())
    }
}

#[async_trait]
impl TimetableRepository for MongoTimetableRepository {
    async fn find_for_class_term(
        &self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>> {
        let timetable = self
            .collection
            .find_one(doc! {
                "class_id": class_id,
                "academic_session_id": academic_session_id,
                "term": term.as_str(),
            })
            .await?;
        Ok(timetable)
    }

    async fn list_for_class(&self, class_id: &str) -> AppResult<Vec<Timetable>> {
        let find_options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .collection
            .find(doc! { "class_id": class_id })
            .with_options(find_options)
            .await?;
        let items: Vec<Timetable> = cursor.try_collect().await?;
        Ok(items)
    }

    async fn exists_for_exam(&self, exam_id: &str) -> AppResult<bool> {
        let count = self
            .collection
            .count_documents(doc! { "exam_id": exam_id })
            .await?;
        Ok(count > 0)
    }
}
