use async_trait::async_trait;
use mongodb::{bson::doc, Collection};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::{AcademicSession, ClassEnrolment, ResultSetting, SchoolClass},
};

/// Read-only view of records the rest of the school backend owns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchoolDirectory: Send + Sync {
    async fn find_session(&self, academic_session_id: &str) -> AppResult<Option<AcademicSession>>;
    async fn find_class(&self, class_id: &str) -> AppResult<Option<SchoolClass>>;
    async fn find_enrolment(
        &self,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<ClassEnrolment>>;
    async fn find_result_setting(&self, level: &str) -> AppResult<Option<ResultSetting>>;
}

pub struct MongoSchoolDirectory {
    sessions: Collection<AcademicSession>,
    classes: Collection<SchoolClass>,
    enrolments: Collection<ClassEnrolment>,
    result_settings: Collection<ResultSetting>,
}

impl MongoSchoolDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            sessions: db.get_collection(collections::SESSIONS),
            classes: db.get_collection(collections::CLASSES),
            enrolments: db.get_collection(collections::ENROLMENTS),
            result_settings: db.get_collection(collections::RESULT_SETTINGS),
        }
    }
}

#[async_trait]
impl SchoolDirectory for MongoSchoolDirectory {
    async fn find_session(&self, academic_session_id: &str) -> AppResult<Option<AcademicSession>> {
        let session = self.sessions.find_one(doc! { "id": academic_session_id }).await?;
        Ok(session)
    }

    async fn find_class(&self, class_id: &str) -> AppResult<Option<SchoolClass>> {
        let class = self.classes.find_one(doc! { "id": class_id }).await?;
        Ok(class)
    }

    async fn find_enrolment(
        &self,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<ClassEnrolment>> {
        let enrolment = self
            .enrolments
            .find_one(doc! {
                "class_id": class_id,
                "academic_session_id": academic_session_id,
            })
            .await?;
        Ok(enrolment)
    }

    async fn find_result_setting(&self, level: &str) -> AppResult<Option<ResultSetting>> {
        let setting = self.result_settings.find_one(doc! { "level": level }).await?;
        Ok(setting)
    }
}
