/// Execution Mode Controller
///
/// **Core Responsibility:**
/// The single entry point for judging. Mode is an explicit parameter of the
/// request built here, not a separate code path.
///
/// **Run:**
/// Sample cases (or one custom-input case), no persistence, no progress.
/// Safe to repeat.
///
/// **Submit:**
/// Authenticated user and known problem required up front. Full suite,
/// exactly one append-only record, progress applied on the first accepted
/// solve only, problem counters updated. Once execution starts a verdict is
/// always returned; persistence failures are logged, never surfaced.

use std::sync::Arc;

use chrono::Utc;
use judge_common::store::{ProblemCatalog, ProgressStore, SubmissionStore};
use judge_common::types::{
    ComparisonMode, ExecutionBackend, ExecutionOutcome, OutcomeStatus, Problem, SubmissionRecord,
    TestCase, UserProgress, Verdict,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::builder;
use crate::error::JudgeError;
use crate::evaluator::{aggregate, case_status, Judgement};
use crate::executor::{execute_with_fallback, Execution, Executor};
use crate::languages::{Language, LanguageRegistry, FALLBACK_LANGUAGE};

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub source_code: String,
    pub language: String,
    #[serde(default)]
    pub problem_id: Option<String>,
    #[serde(default)]
    pub custom_input: Option<String>,
}

/// One visible or custom case in a Run response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub index: usize,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    pub actual_output: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResponse {
    pub verdict: Verdict,
    pub passed: u32,
    pub total: u32,
    pub test_results: Vec<CaseResult>,
    pub backend: ExecutionBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub source_code: String,
    pub language: String,
    pub problem_id: String,
    /// Supplied by the authentication layer, never by the request body
    #[serde(skip)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    /// Absent when the record could not be persisted
    pub submission_id: Option<Uuid>,
    pub verdict: Verdict,
    pub passed: u32,
    pub total: u32,
    pub elapsed_ms: u64,
    pub memory_kb: u64,
    /// True when this submission was the user's first accepted solve
    pub first_solve: bool,
    pub backend: ExecutionBackend,
}

pub struct JudgeEngine {
    registry: LanguageRegistry,
    remote: Option<Arc<dyn Executor>>,
    fallback: Arc<dyn Executor>,
    catalog: Arc<dyn ProblemCatalog>,
    submissions: Arc<dyn SubmissionStore>,
    progress: Arc<dyn ProgressStore>,
}

impl JudgeEngine {
    /// Engine without a remote sandbox; add one with `with_remote`
    pub fn new(
        registry: LanguageRegistry,
        fallback: Arc<dyn Executor>,
        catalog: Arc<dyn ProblemCatalog>,
        submissions: Arc<dyn SubmissionStore>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            registry,
            remote: None,
            fallback,
            catalog,
            submissions,
            progress,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn Executor>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    #[tracing::instrument(skip_all, fields(language = %request.language, problem_id = ?request.problem_id))]
    pub async fn run(&self, request: RunRequest) -> Result<RunResponse, JudgeError> {
        require_source(&request.source_code)?;
        let language = self.resolve_language(&request.language)?;

        let problem = match request.problem_id.as_deref() {
            Some(id) => Some(self.load_problem(id).await?),
            None => None,
        };

        // The problem supplies the entry point even for custom input
        let exec_request = match (&request.custom_input, &problem) {
            (Some(input), Some(problem)) => builder::custom(&request.source_code, language, input, problem),
            (None, Some(problem)) => builder::sample(&request.source_code, language, problem),
            (_, None) => {
                return Err(JudgeError::InvalidRequest("problem_id is required".to_string()));
            }
        };
        if exec_request.test_cases().is_empty() {
            let id = request.problem_id.unwrap_or_default();
            return Err(JudgeError::NoTestCases(id));
        }

        let comparison = comparison_of(problem.as_ref());
        let execution = self.execute(&exec_request).await;
        let judgement = aggregate(&execution.outcomes, exec_request.test_cases(), comparison);

        let test_results = execution
            .outcomes
            .iter()
            .zip(exec_request.test_cases())
            .enumerate()
            .map(|(index, (outcome, test_case))| case_result(index, outcome, test_case, comparison))
            .collect();

        info!(
            verdict = %judgement.verdict,
            passed = judgement.passed,
            total = judgement.total,
            backend = %execution.backend,
            "Run completed"
        );

        Ok(RunResponse {
            verdict: judgement.verdict,
            passed: judgement.passed,
            total: judgement.total,
            test_results,
            backend: execution.backend,
        })
    }

    #[tracing::instrument(skip_all, fields(language = %request.language, problem_id = %request.problem_id))]
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, JudgeError> {
        let user_id = match request.user_id.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => user.to_string(),
            _ => return Err(JudgeError::Unauthenticated),
        };
        require_source(&request.source_code)?;
        let language = self.resolve_language(&request.language)?;
        let problem = self.load_problem(&request.problem_id).await?;
        if problem.test_cases.is_empty() {
            return Err(JudgeError::NoTestCases(problem.id));
        }

        let exec_request = builder::full(&request.source_code, language, &problem);
        let execution = self.execute(&exec_request).await;
        let judgement = aggregate(&execution.outcomes, exec_request.test_cases(), problem.comparison);
        let accepted = judgement.verdict.is_accepted();

        // Checked before the record exists so this submission never counts as prior
        let previously_solved = if accepted {
            match self.submissions.has_accepted(&user_id, &problem.id).await {
                Ok(solved) => solved,
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Failed to read solve history, skipping progress");
                    true
                }
            }
        } else {
            false
        };

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            problem_id: problem.id.clone(),
            language: language.name.clone(),
            source_code: request.source_code,
            verdict: judgement.verdict,
            passed: judgement.passed,
            total: judgement.total,
            elapsed_ms: judgement.elapsed_ms,
            memory_kb: judgement.memory_kb,
            outcomes: execution.outcomes,
            created_at: Utc::now(),
        };

        let submission_id = match self.submissions.create_submission(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(submission_id = %record.id, user_id = %user_id, error = %e, "Failed to persist submission");
                None
            }
        };

        // Progress follows a durable record; otherwise a retry would count twice
        let first_solve = accepted && !previously_solved && submission_id.is_some();
        if first_solve {
            let today = Utc::now().date_naive();
            match self
                .progress
                .apply_accepted_solve(&user_id, problem.difficulty, today)
                .await
            {
                Ok(progress) => info!(
                    user_id = %user_id,
                    total_solved = progress.total_solved,
                    current_streak = progress.current_streak,
                    xp = progress.xp,
                    "Progress updated"
                ),
                Err(e) => error!(user_id = %user_id, error = %e, "Failed to update progress"),
            }
        }

        if let Err(e) = self.catalog.record_attempt(&problem.id, accepted).await {
            error!(problem_id = %problem.id, error = %e, "Failed to update problem counters");
        }

        info!(
            submission_id = ?submission_id,
            user_id = %user_id,
            verdict = %judgement.verdict,
            passed = judgement.passed,
            total = judgement.total,
            executed = judgement.executed,
            backend = %execution.backend,
            "Submission judged"
        );

        Ok(submit_response(submission_id, &judgement, first_solve, execution.backend))
    }

    pub async fn get_submission(&self, id: &Uuid) -> Result<Option<SubmissionRecord>, JudgeError> {
        Ok(self.submissions.get_submission(id).await?)
    }

    pub async fn get_progress(&self, user_id: &str) -> Result<UserProgress, JudgeError> {
        Ok(self.progress.get_progress(user_id).await?)
    }

    pub fn languages(&self) -> &[Language] {
        self.registry.languages()
    }

    /// Without a remote sandbox only the fallback language can execute
    fn resolve_language(&self, name: &str) -> Result<&Language, JudgeError> {
        let language = self.registry.resolve(name)?;
        if self.remote.is_none() && language.name != FALLBACK_LANGUAGE {
            return Err(JudgeError::UnsupportedLanguage(language.name.clone()));
        }
        Ok(language)
    }

    async fn load_problem(&self, problem_id: &str) -> Result<Problem, JudgeError> {
        self.catalog
            .get_problem(problem_id)
            .await?
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }

    async fn execute(&self, request: &builder::ExecutionRequest) -> Execution {
        let execution = execute_with_fallback(request, self.remote.as_deref(), self.fallback.as_ref()).await;
        if let Some(diagnostics) = &execution.diagnostics {
            warn!(backend = %execution.backend, diagnostics = %diagnostics, "Execution degraded");
        }
        execution
    }
}

fn require_source(source_code: &str) -> Result<(), JudgeError> {
    if source_code.trim().is_empty() {
        return Err(JudgeError::InvalidRequest("source_code is empty".to_string()));
    }
    Ok(())
}

fn comparison_of(problem: Option<&Problem>) -> ComparisonMode {
    problem.map(|p| p.comparison).unwrap_or_default()
}

fn case_result(
    index: usize,
    outcome: &ExecutionOutcome,
    test_case: &TestCase,
    comparison: ComparisonMode,
) -> CaseResult {
    let status = case_status(outcome, test_case, comparison);
    let error = match status {
        OutcomeStatus::CompilationError => outcome
            .compile_output
            .clone()
            .or_else(|| Some(outcome.stderr.clone())),
        OutcomeStatus::RuntimeError | OutcomeStatus::TimeLimitExceeded | OutcomeStatus::InternalError => {
            Some(outcome.stderr.clone())
        }
        _ => None,
    };

    CaseResult {
        index,
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        actual_output: outcome.stdout.clone(),
        status,
        error: error.filter(|e| !e.trim().is_empty()),
        elapsed_ms: outcome.elapsed_ms,
    }
}

fn submit_response(
    submission_id: Option<Uuid>,
    judgement: &Judgement,
    first_solve: bool,
    backend: ExecutionBackend,
) -> SubmitResponse {
    SubmitResponse {
        submission_id,
        verdict: judgement.verdict,
        passed: judgement.passed,
        total: judgement.total,
        elapsed_ms: judgement.elapsed_ms,
        memory_kb: judgement.memory_kb,
        first_solve,
        backend,
    }
}
