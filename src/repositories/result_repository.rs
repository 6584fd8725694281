use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::{StudentResult, SubjectResult},
};

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn find_subject_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>>;
    async fn find_student_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>>;
}

pub struct MongoResultRepository {
    subject_results: Collection<SubjectResult>,
    student_results: Collection<StudentResult>,
}

impl MongoResultRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            subject_results: db.get_collection(collections::SUBJECT_RESULTS),
            student_results: db.get_collection(collections::STUDENT_RESULTS),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for result collections");

        let subject_index = IndexModel::builder()
            .keys(doc! {
                "student_id": 1,
                "class_id": 1,
                "academic_session_id": 1,
                "subject_id": 1,
            })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("student_subject_session_unique".to_string())
                    .build(),
            )
            .build();

        let student_index = IndexModel::builder()
            .keys(doc! { "student_id": 1, "class_id": 1, "academic_session_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("student_session_unique".to_string())
                    .build(),
            )
            .build();

        self.subject_results.create_index(subject_index).await?;
        self.student_results.create_index(student_index).await?;

        log::info!("Successfully created indexes for result collections");
        Ok(())
    }
}

pub(crate) fn subject_result_filter(
    student_id: &str,
    class_id: &str,
    academic_session_id: &str,
    subject_id: &str,
) -> mongodb::bson::Document {
    doc! {
        "student_id": student_id,
        "class_id": class_id,
        "academic_session_id": academic_session_id,
        "subject_id": subject_id,
    }
}

pub(crate) fn student_result_filter(
    student_id: &str,
    class_id: &str,
    academic_session_id: &str,
) -> mongodb::bson::Document {
    doc! {
        "student_id": student_id,
        "class_id": class_id,
        "academic_session_id": academic_session_id,
    }
}

#[async_trait]
impl ResultRepository for MongoResultRepository {
    async fn find_subject_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>> {
        let result = self
            .subject_results
            .find_one(subject_result_filter(student_id, class_id, academic_session_id, subject_id))
            .await?;
        Ok(result)
    }

    async fn find_student_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>> {
        let result = self
            .student_results
            .find_one(student_result_filter(student_id, class_id, academic_session_id))
            .await?;
        Ok(result)
    }
}
