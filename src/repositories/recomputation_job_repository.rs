use async_trait::async_trait;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{collections, Database},
    errors::AppResult,
    models::domain::RecomputationJob,
};

/// Hand-off point to the external rank/average worker. Delivery is at-least-once,
/// so consumers must treat a repeated job as a no-op.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecomputationQueue: Send + Sync {
    async fn enqueue(&self, job: RecomputationJob) -> AppResult<String>;
}

pub struct MongoRecomputationJobRepository {
    collection: Collection<RecomputationJob>,
}

impl MongoRecomputationJobRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection(collections::RECOMPUTATION_JOBS);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for {} collection", collections::RECOMPUTATION_JOBS);

        let job_id_index = IndexModel::builder()
            .keys(doc! { "job_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("job_id_unique".to_string())
                    .build(),
            )
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": 1 })
            .build();

        self.collection.create_index(job_id_index).await?;
        self.collection.create_index(status_index).await?;

        log::info!("Successfully created indexes for {} collection", collections::RECOMPUTATION_JOBS);
        Ok(())
    }
}

#[async_trait]
impl RecomputationQueue for MongoRecomputationJobRepository {
    async fn enqueue(&self, job: RecomputationJob) -> AppResult<String> {
        let job_id = job.job_id.clone();
        self.collection.insert_one(&job).await?;
        Ok(job_id)
    }
}
