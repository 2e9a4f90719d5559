//! In-process store used by tests and the CLI.

use crate::store::{ProblemCatalog, ProgressStore, StoreError, StoreResult, SubmissionStore};
use crate::types::{Difficulty, Problem, ProblemStats, SubmissionRecord, UserProgress};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    problems: HashMap<String, Problem>,
    stats: HashMap<String, ProblemStats>,
    submissions: Vec<SubmissionRecord>,
    solved: HashSet<(String, String)>,
    progress: HashMap<String, UserProgress>,
    // Fault injection for tests
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_problems(problems: impl IntoIterator<Item = Problem>) -> Self {
        let store = Self::new();
        for problem in problems {
            store.insert_problem(problem);
        }
        store
    }

    pub fn insert_problem(&self, problem: Problem) {
        self.lock().problems.insert(problem.id.clone(), problem);
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.lock().submissions.clone()
    }

    pub fn stats(&self, problem_id: &str) -> ProblemStats {
        self.lock().stats.get(problem_id).copied().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-write
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(state: &State) -> StoreResult<()> {
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProblemCatalog for MemoryStore {
    async fn get_problem(&self, problem_id: &str) -> StoreResult<Option<Problem>> {
        Ok(self.lock().problems.get(problem_id).cloned())
    }

    async fn record_attempt(&self, problem_id: &str, accepted: bool) -> StoreResult<ProblemStats> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        let stats = state.stats.entry(problem_id.to_string()).or_default();
        stats.record(accepted);
        Ok(*stats)
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create_submission(&self, record: &SubmissionRecord) -> StoreResult<Uuid> {
        let mut state = self.lock();
        Self::check_writable(&state)?;

        if state.submissions.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Conflict(record.id.to_string()));
        }
        if record.verdict.is_accepted() {
            state
                .solved
                .insert((record.user_id.clone(), record.problem_id.clone()));
        }
        state.submissions.push(record.clone());
        Ok(record.id)
    }

    async fn get_submission(&self, id: &Uuid) -> StoreResult<Option<SubmissionRecord>> {
        Ok(self.lock().submissions.iter().find(|r| &r.id == id).cloned())
    }

    async fn has_accepted(&self, user_id: &str, problem_id: &str) -> StoreResult<bool> {
        let key = (user_id.to_string(), problem_id.to_string());
        Ok(self.lock().solved.contains(&key))
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_progress(&self, user_id: &str) -> StoreResult<UserProgress> {
        Ok(self
            .lock()
            .progress
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserProgress::new(user_id)))
    }

    async fn apply_accepted_solve(
        &self,
        user_id: &str,
        difficulty: Difficulty,
        today: NaiveDate,
    ) -> StoreResult<UserProgress> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        let progress = state
            .progress
            .entry(user_id.to_string())
            .or_insert_with(|| UserProgress::new(user_id));
        progress.record_solve(difficulty, today);
        Ok(progress.clone())
    }
}
