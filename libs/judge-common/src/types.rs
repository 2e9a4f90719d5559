use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One (input, expected output) pair from the problem catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    /// Absent only for ad-hoc custom-input runs
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

impl TestCase {
    pub fn visible(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: Some(expected_output.into()),
            is_hidden: false,
        }
    }

    pub fn hidden(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: Some(expected_output.into()),
            is_hidden: true,
        }
    }

    /// Synthesized case for a custom-input run; never compared
    pub fn custom(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: None,
            is_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// XP awarded for the first accepted solve of a problem
    pub fn xp(self) -> u64 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 40,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// How actual output is compared against expected output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonMode {
    /// Trimmed exact text match
    #[default]
    Ordered,
    /// JSON arrays compared as multisets; anything else as `Ordered`
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub time_limit_seconds: f64,
    pub memory_limit_kb: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            time_limit_seconds: 2.0,
            memory_limit_kb: 128_000,
        }
    }
}

/// Catalog view of a problem, as far as judging needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    /// Function the fallback harness calls with the parsed input lines
    pub entry_point: String,
    #[serde(default)]
    pub comparison: ComparisonMode,
    #[serde(default)]
    pub limits: Option<ExecutionLimits>,
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    pub fn effective_limits(&self) -> ExecutionLimits {
        self.limits.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Sample cases only, no persistence
    Run,
    /// Full suite, persisted record and progress effects
    Submit,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Run => write!(f, "run"),
            ExecutionMode::Submit => write!(f, "submit"),
        }
    }
}

/// Canonical per-case status, shared by the remote and fallback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
    InternalError,
}

impl OutcomeStatus {
    /// True when the program ran to completion and produced comparable output
    pub fn completed(self) -> bool {
        matches!(self, OutcomeStatus::Accepted | OutcomeStatus::WrongAnswer)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Accepted => "Accepted",
            OutcomeStatus::WrongAnswer => "Wrong Answer",
            OutcomeStatus::TimeLimitExceeded => "Time Limit Exceeded",
            OutcomeStatus::CompilationError => "Compilation Error",
            OutcomeStatus::RuntimeError => "Runtime Error",
            OutcomeStatus::InternalError => "Internal Error",
        };
        write!(f, "{}", s)
    }
}

/// Raw status as reported by whichever backend ran the case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub id: u32,
    pub description: String,
}

/// Result of executing one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub compile_output: Option<String>,
    pub elapsed_ms: u64,
    pub memory_kb: u64,
    pub exit_code: Option<i64>,
    pub status: OutcomeStatus,
    pub provider_status: ProviderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    CompilationError,
    InternalError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::TimeLimitExceeded => "time_limit_exceeded",
            Verdict::CompilationError => "compilation_error",
            Verdict::InternalError => "internal_error",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which execution path produced the outcomes of a judgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionBackend {
    Remote,
    Fallback,
    /// Neither path produced outcomes
    None,
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionBackend::Remote => write!(f, "remote"),
            ExecutionBackend::Fallback => write!(f, "fallback"),
            ExecutionBackend::None => write!(f, "none"),
        }
    }
}

/// Persisted, append-only record of one Submit call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    pub language: String,
    pub source_code: String,
    pub verdict: Verdict,
    pub passed: u32,
    pub total: u32,
    pub elapsed_ms: u64,
    pub memory_kb: u64,
    pub outcomes: Vec<ExecutionOutcome>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub solved_easy: u32,
    pub solved_medium: u32,
    pub solved_hard: u32,
    pub total_solved: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub xp: u64,
    pub last_solved_on: Option<NaiveDate>,
}

impl UserProgress {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            solved_easy: 0,
            solved_medium: 0,
            solved_hard: 0,
            total_solved: 0,
            current_streak: 0,
            longest_streak: 0,
            xp: 0,
            last_solved_on: None,
        }
    }

    /// Apply one first-time accepted solve on `today`.
    ///
    /// Streak rules:
    /// - last solve today: unchanged
    /// - last solve yesterday: +1
    /// - older or never: reset to 1
    ///
    /// Callers guarantee this runs once per (user, problem).
    pub fn record_solve(&mut self, difficulty: Difficulty, today: NaiveDate) {
        match difficulty {
            Difficulty::Easy => self.solved_easy += 1,
            Difficulty::Medium => self.solved_medium += 1,
            Difficulty::Hard => self.solved_hard += 1,
        }
        self.total_solved += 1;
        self.xp += difficulty.xp();

        self.current_streak = match self.last_solved_on {
            Some(last) if last == today => self.current_streak.max(1),
            Some(last) if last + Duration::days(1) == today => self.current_streak + 1,
            _ => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_solved_on = Some(today);
    }
}

/// Aggregate submission counters kept on a problem
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemStats {
    pub total_submissions: u64,
    pub accepted_submissions: u64,
    pub acceptance_rate: f64,
}

impl ProblemStats {
    pub fn record(&mut self, accepted: bool) {
        self.total_submissions += 1;
        if accepted {
            self.accepted_submissions += 1;
        }
        self.acceptance_rate = acceptance_rate(self.accepted_submissions, self.total_submissions);
    }
}

/// Percentage of accepted submissions, rounded to two decimals
pub fn acceptance_rate(accepted: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = accepted as f64 * 100.0 / total as f64;
    (rate * 100.0).round() / 100.0
}
