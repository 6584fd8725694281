use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    models::domain::{RecomputationJob, RecomputationKey, RecomputationKind},
    repositories::RecomputationQueue,
};

/// Fire-and-forget hand-off of rank and average recomputation after a submission.
#[derive(Clone)]
pub struct RecomputationDispatcher {
    queue: Arc<dyn RecomputationQueue>,
}

impl RecomputationDispatcher {
    pub fn new(queue: Arc<dyn RecomputationQueue>) -> Self {
        Self { queue }
    }

    /// Enqueues one job per recomputation kind on a background task. Failures are
    /// logged and never reach the submitting student.
    pub fn dispatch(&self, key: RecomputationKey) -> JoinHandle<()> {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            for kind in RecomputationKind::all() {
                let job = RecomputationJob::new(kind, key.clone());
                match queue.enqueue(job).await {
                    Ok(job_id) => log::debug!(
                        "Queued {} job {} for student {} subject {}",
                        kind.as_str(),
                        job_id,
                        key.student_id,
                        key.subject_id
                    ),
                    Err(e) => log::error!(
                        "Failed to queue {} job for student {} subject {}: {}",
                        kind.as_str(),
                        key.student_id,
                        key.subject_id,
                        e
                    ),
                }
            }
        })
    }
}
