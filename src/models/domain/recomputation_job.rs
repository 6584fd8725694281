use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::exam_definition::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecomputationKind {
    /// Class-wide subject rank for one subject.
    #[serde(rename = "subject-position")]
    SubjectPosition,
    /// Subject cumulative average across terms.
    #[serde(rename = "update-cum-score")]
    UpdateCumScore,
}

impl RecomputationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecomputationKind::SubjectPosition => "subject-position",
            RecomputationKind::UpdateCumScore => "update-cum-score",
        }
    }

    pub fn all() -> [RecomputationKind; 2] {
        [RecomputationKind::SubjectPosition, RecomputationKind::UpdateCumScore]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Keys the external worker needs to recompute one student's derived figures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecomputationKey {
    pub student_id: String,
    pub subject_id: String,
    pub class_id: String,
    pub academic_session_id: String,
    pub term: Term,
}

/// Job document handed to the external recomputation worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputationJob {
    pub job_id: String,
    pub kind: RecomputationKind,
    #[serde(flatten)]
    pub key: RecomputationKey,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub retries_remaining: u32,
}

impl RecomputationJob {
    pub fn new(kind: RecomputationKind, key: RecomputationKey) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            kind,
            key,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            retries_remaining: 3,
        }
    }
}
