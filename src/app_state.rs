use std::sync::Arc;

use crate::{
    config::{Config, StorageBackend},
    db::Database,
    errors::AppResult,
    realtime::ChannelDispatcher,
    repositories::{InMemoryStore, Repositories},
    services::{
        AuthorizationService, Clock, ExamAttemptService, ExamDefinitionService,
        QuestionBankService, RandomSeedSource, RecomputationDispatcher, ScoringService, SeedSource,
        SystemClock, TimetableService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub exam_definition_service: Arc<ExamDefinitionService>,
    pub timetable_service: Arc<TimetableService>,
    pub question_bank_service: Arc<QuestionBankService>,
    pub authorization_service: Arc<AuthorizationService>,
    pub exam_attempt_service: Arc<ExamAttemptService>,
    pub channel: ChannelDispatcher,
    pub db: Option<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let seeds: Arc<dyn SeedSource> = Arc::new(RandomSeedSource);

        match config.storage_backend {
            StorageBackend::Mongo => {
                let db = Database::connect(&config).await?;
                let repositories = Repositories::mongo(&db).await?;
                Ok(Self::with_repositories(config, repositories, Some(db), clock, seeds))
            }
            StorageBackend::Memory => {
                log::warn!("Using the in-memory storage backend; nothing will be persisted");
                let repositories = Repositories::in_memory(Arc::new(InMemoryStore::new()));
                Ok(Self::with_repositories(config, repositories, None, clock, seeds))
            }
        }
    }

    /// Wires every service over the given storage, clock and seed source.
    pub fn with_repositories(
        config: Config,
        repositories: Repositories,
        db: Option<Database>,
        clock: Arc<dyn Clock>,
        seeds: Arc<dyn SeedSource>,
    ) -> Self {
        let cutoffs = config.cutoffs;
        let Repositories {
            exam_definitions,
            timetables,
            question_sets,
            attempts,
            results: _,
            directory,
            recomputation_queue,
            transactions,
        } = repositories;

        let exam_definition_service = Arc::new(ExamDefinitionService::new(
            exam_definitions.clone(),
            timetables.clone(),
            directory.clone(),
        ));
        let timetable_service = Arc::new(TimetableService::new(
            timetables.clone(),
            exam_definitions.clone(),
            directory.clone(),
            transactions.clone(),
            clock.clone(),
            cutoffs,
        ));
        let question_bank_service = Arc::new(QuestionBankService::new(
            question_sets.clone(),
            timetables.clone(),
            exam_definitions.clone(),
            directory.clone(),
            transactions.clone(),
            clock.clone(),
            cutoffs,
        ));
        let authorization_service = Arc::new(AuthorizationService::new(
            question_sets.clone(),
            timetables,
            exam_definitions.clone(),
            directory.clone(),
            transactions.clone(),
            clock.clone(),
        ));
        let scoring_service = Arc::new(ScoringService::new(
            directory.clone(),
            transactions.clone(),
            RecomputationDispatcher::new(recomputation_queue),
            clock.clone(),
        ));
        let exam_attempt_service = Arc::new(ExamAttemptService::new(
            attempts,
            question_sets,
            exam_definitions,
            directory,
            transactions,
            scoring_service,
            clock,
            seeds,
            cutoffs,
        ));

        Self {
            exam_definition_service,
            timetable_service,
            question_bank_service,
            authorization_service,
            channel: ChannelDispatcher::new(exam_attempt_service.clone()),
            exam_attempt_service,
            db,
            config: Arc::new(config),
        }
    }

    /// Storage readiness; the in-memory backend is always ready.
    pub async fn health_check(&self) -> AppResult<()> {
        match &self.db {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn in_memory_state_wires_every_service() {
        let state = AppState::with_repositories(
            Config::test_config(),
            Repositories::in_memory(Arc::new(InMemoryStore::new())),
            None,
            Arc::new(SystemClock),
            Arc::new(RandomSeedSource),
        );
        assert!(state.db.is_none());
        assert_eq!(state.config.cutoffs, Config::test_config().cutoffs);
    }
}
