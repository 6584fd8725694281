pub mod exam_attempt_repository;
pub mod exam_definition_repository;
pub mod in_memory;
pub mod question_set_repository;
pub mod recomputation_job_repository;
pub mod result_repository;
pub mod school_directory;
pub mod timetable_repository;
pub mod unit_of_work;

use std::sync::Arc;

pub use exam_attempt_repository::{ExamAttemptRepository, MongoExamAttemptRepository};
pub use exam_definition_repository::{ExamDefinitionRepository, MongoExamDefinitionRepository};
pub use in_memory::InMemoryStore;
pub use question_set_repository::{MongoQuestionSetRepository, QuestionSetRepository};
pub use recomputation_job_repository::{MongoRecomputationJobRepository, RecomputationQueue};
pub use result_repository::{MongoResultRepository, ResultRepository};
pub use school_directory::{MongoSchoolDirectory, SchoolDirectory};
pub use timetable_repository::{MongoTimetableRepository, TimetableRepository};
pub use unit_of_work::{MongoTransactionManager, TransactionManager, UnitOfWork};

use crate::{db::Database, errors::AppResult};

/// Every storage seam the services need, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub exam_definitions: Arc<dyn ExamDefinitionRepository>,
    pub timetables: Arc<dyn TimetableRepository>,
    pub question_sets: Arc<dyn QuestionSetRepository>,
    pub attempts: Arc<dyn ExamAttemptRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub directory: Arc<dyn SchoolDirectory>,
    pub recomputation_queue: Arc<dyn RecomputationQueue>,
    pub transactions: Arc<dyn TransactionManager>,
}

impl Repositories {
    pub async fn mongo(db: &Database) -> AppResult<Self> {
        let exam_definitions = Arc::new(MongoExamDefinitionRepository::new(db));
        exam_definitions.ensure_indexes().await?;

        let timetables = Arc::new(MongoTimetableRepository::new(db));
        timetables.ensure_indexes().await?;

        let question_sets = Arc::new(MongoQuestionSetRepository::new(db));
        question_sets.ensure_indexes().await?;

        let attempts = Arc::new(MongoExamAttemptRepository::new(db));
        attempts.ensure_indexes().await?;

        let results = Arc::new(MongoResultRepository::new(db));
        results.ensure_indexes().await?;

        let recomputation_queue = Arc::new(MongoRecomputationJobRepository::new(db));
        recomputation_queue.ensure_indexes().await?;

        Ok(Self {
            exam_definitions,
            timetables,
            question_sets,
            attempts,
            results,
            directory: Arc::new(MongoSchoolDirectory::new(db)),
            recomputation_queue,
            transactions: Arc::new(MongoTransactionManager::new(db)),
        })
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            exam_definitions: store.clone(),
            timetables: store.clone(),
            question_sets: store.clone(),
            attempts: store.clone(),
            results: store.clone(),
            directory: store.clone(),
            recomputation_queue: store.clone(),
            transactions: store,
        }
    }
}
