use crate::store::{ProblemCatalog, ProgressStore, StoreError, StoreResult, SubmissionStore};
use crate::types::{acceptance_rate, Difficulty, Problem, ProblemStats, SubmissionRecord, UserProgress};
use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

/// Redis key layout - defines only semantics, not runtime logic
/// Keeps the API, the CLI and the catalog writer agreeing on where
/// documents live

pub const PROBLEM_PREFIX: &str = "judge:problem";
pub const PROBLEM_STATS_PREFIX: &str = "judge:problem-stats";
pub const SUBMISSION_PREFIX: &str = "judge:submission";
pub const SUBMISSIONS_INDEX_PREFIX: &str = "judge:submissions";
pub const SOLVED_PREFIX: &str = "judge:solved";
pub const PROGRESS_PREFIX: &str = "judge:progress";

/// Problem document (catalog-owned)
pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

/// Hash with `total`, `accepted` and `acceptance_rate`
pub fn problem_stats_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_STATS_PREFIX, problem_id)
}

pub fn submission_key(id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, id)
}

/// Ordered list of submission ids for one (user, problem)
pub fn submissions_index_key(user_id: &str, problem_id: &str) -> String {
    format!("{}:{}:{}", SUBMISSIONS_INDEX_PREFIX, user_id, problem_id)
}

/// Set of problem ids the user has an Accepted record for
pub fn solved_key(user_id: &str) -> String {
    format!("{}:{}", SOLVED_PREFIX, user_id)
}

pub fn progress_key(user_id: &str) -> String {
    format!("{}:{}", PROGRESS_PREFIX, user_id)
}

/// Index and solved-set writes for a stored record, applied as one MULTI/EXEC
fn index_pipeline(record: &SubmissionRecord) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .rpush(submissions_index_key(&record.user_id, &record.problem_id), record.id.to_string())
        .ignore();
    if record.verdict.is_accepted() {
        pipe.sadd(solved_key(&record.user_id), &record.problem_id).ignore();
    }
    pipe
}

/// Redis-backed catalog, submission and progress store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ProblemCatalog for RedisStore {
    async fn get_problem(&self, problem_id: &str) -> StoreResult<Option<Problem>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(problem_key(problem_id)).await?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn record_attempt(&self, problem_id: &str, accepted: bool) -> StoreResult<ProblemStats> {
        let mut conn = self.conn.clone();
        let key = problem_stats_key(problem_id);

        let total: u64 = conn.hincr(&key, "total", 1).await?;
        let accepted_count: u64 = conn.hincr(&key, "accepted", u64::from(accepted)).await?;

        let rate = acceptance_rate(accepted_count, total);
        let _: () = conn.hset(&key, "acceptance_rate", rate).await?;

        debug!(problem_id, total, accepted = accepted_count, rate, "Problem counters updated");

        Ok(ProblemStats {
            total_submissions: total,
            accepted_submissions: accepted_count,
            acceptance_rate: rate,
        })
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn create_submission(&self, record: &SubmissionRecord) -> StoreResult<Uuid> {
        let mut conn = self.conn.clone();
        let key = submission_key(&record.id);
        let payload = serde_json::to_string(record)?;

        // SET NX keeps records append-only
        let created: bool = conn.set_nx(&key, payload).await?;
        if !created {
            return Err(StoreError::Conflict(key));
        }

        if let Err(e) = index_pipeline(record).query_async::<_, ()>(&mut conn).await {
            // Drop the orphan so a retry is not mistaken for a prior solve
            if let Err(del_err) = conn.del::<_, ()>(&key).await {
                warn!(key = %key, error = %del_err, "Failed to remove unindexed submission");
            }
            return Err(e.into());
        }

        Ok(record.id)
    }

    async fn get_submission(&self, id: &Uuid) -> StoreResult<Option<SubmissionRecord>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(submission_key(id)).await?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn has_accepted(&self, user_id: &str, problem_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let solved: bool = conn.sismember(solved_key(user_id), problem_id).await?;
        Ok(solved)
    }
}

#[async_trait]
impl ProgressStore for RedisStore {
    async fn get_progress(&self, user_id: &str) -> StoreResult<UserProgress> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(progress_key(user_id)).await?;

        match payload {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(UserProgress::new(user_id)),
        }
    }

    async fn apply_accepted_solve(
        &self,
        user_id: &str,
        difficulty: Difficulty,
        today: NaiveDate,
    ) -> StoreResult<UserProgress> {
        // No WATCH/MULTI: concurrent solves by one user race, last write wins
        let mut progress = self.get_progress(user_id).await?;
        progress.record_solve(difficulty, today);

        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&progress)?;
        let _: () = conn.set(progress_key(user_id), payload).await?;

        Ok(progress)
    }
}
