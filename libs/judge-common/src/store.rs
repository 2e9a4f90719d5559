//! Narrow persistence and catalog interfaces used by the judging engine.
//!
//! The engine only ever talks to these traits; `redis` and `memory` provide
//! the production and test implementations.

use crate::types::{Difficulty, Problem, ProblemStats, SubmissionRecord, UserProgress};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Append-only write hit an existing key
    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of the problem catalog plus the counters judging updates
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn get_problem(&self, problem_id: &str) -> StoreResult<Option<Problem>>;

    /// Increment total, increment accepted iff `accepted`, recompute rate
    async fn record_attempt(&self, problem_id: &str, accepted: bool) -> StoreResult<ProblemStats>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Append a record; existing ids are never overwritten
    async fn create_submission(&self, record: &SubmissionRecord) -> StoreResult<Uuid>;

    async fn get_submission(&self, id: &Uuid) -> StoreResult<Option<SubmissionRecord>>;

    /// Whether an Accepted record already exists for (user, problem)
    async fn has_accepted(&self, user_id: &str, problem_id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(&self, user_id: &str) -> StoreResult<UserProgress>;

    /// Read-modify-write of the user's counters without a lock.
    /// The caller has already established this is the first accepted solve.
    async fn apply_accepted_solve(
        &self,
        user_id: &str,
        difficulty: Difficulty,
        today: NaiveDate,
    ) -> StoreResult<UserProgress>;
}
