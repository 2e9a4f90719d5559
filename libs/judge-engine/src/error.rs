use judge_common::store::StoreError;

/// Errors surfaced to callers of `run`/`submit`
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("problem not found: {0}")]
    ProblemNotFound(String),

    #[error("problem {0} has no test cases")]
    NoTestCases(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading the catalog failed before execution started
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Engine-internal execution failures; they trigger fallback or an
/// InternalError verdict and never reach the caller directly
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid sandbox response: {0}")]
    InvalidResponse(String),

    /// Poll bound exhausted; distinct from a sandbox-reported time limit
    #[error("sandbox did not finish token {token} after {attempts} polls")]
    Timeout { token: String, attempts: u32 },

    #[error("unsupported language for this executor: {0}")]
    UnsupportedLanguage(String),

    #[error("no entry point declared for this request")]
    MissingEntryPoint,

    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl From<reqwest::Error> for ExecutionError {
    fn from(e: reqwest::Error) -> Self {
        ExecutionError::Transport(e.to_string())
    }
}

impl From<bollard::errors::Error> for ExecutionError {
    fn from(e: bollard::errors::Error) -> Self {
        ExecutionError::Runtime(e.to_string())
    }
}
