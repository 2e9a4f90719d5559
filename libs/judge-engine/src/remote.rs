//! Remote execution client for a Judge0-compatible sandbox.
//!
//! Per test case: submit with `wait=false` to get a token, poll the token at a
//! fixed interval until the status leaves "processing", then decode the
//! base64 output fields. A transport failure or an exhausted poll bound
//! aborts the whole request so the caller can fall back.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use judge_common::config::RemoteSettings;
use judge_common::types::{ExecutionOutcome, OutcomeStatus, ProviderStatus};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::builder::{ExecutionRequest, SandboxSubmission};
use crate::error::ExecutionError;
use crate::executor::{should_halt, Executor};

const POLL_FIELDS: &str = "status,stdout,stderr,compile_output,time,memory,exit_code,message";

/// Explicit construction parameters; no global client
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub max_poll_attempts: u32,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            api_host: None,
            max_poll_attempts: 10,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(settings: &RemoteSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_host: settings.api_host.clone(),
            max_poll_attempts: settings.poll_attempts,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            ..Self::new(settings.base_url.clone())
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_polling(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.max_poll_attempts = max_attempts;
        self.poll_interval = interval;
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxStatus {
    pub id: u32,
    pub description: String,
}

/// `time` arrives as a decimal string from Judge0, as a number from some
/// compatible providers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Text(String),
    Number(f64),
}

impl Seconds {
    fn as_millis(&self) -> u64 {
        let secs = match self {
            Seconds::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Seconds::Number(n) => *n,
        };
        (secs * 1000.0).round().max(0.0) as u64
    }
}

/// Poll response
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxResult {
    pub status: SandboxStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    time: Option<Seconds>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SandboxResult {
    fn into_outcome(self) -> ExecutionOutcome {
        let status = canonical_status(self.status.id);
        let mut stderr = decode(self.stderr.as_deref());
        if let Some(message) = self.message.as_deref() {
            let message = decode(Some(message));
            if !message.is_empty() && status == OutcomeStatus::InternalError {
                if !stderr.is_empty() {
                    stderr.push('\n');
                }
                stderr.push_str(&message);
            }
        }

        ExecutionOutcome {
            stdout: decode(self.stdout.as_deref()),
            stderr,
            compile_output: self
                .compile_output
                .as_deref()
                .map(|c| decode(Some(c)))
                .filter(|c| !c.is_empty()),
            elapsed_ms: self.time.as_ref().map(Seconds::as_millis).unwrap_or(0),
            memory_kb: self.memory.unwrap_or(0),
            exit_code: self.exit_code,
            status,
            provider_status: ProviderStatus {
                id: self.status.id,
                description: self.status.description,
            },
        }
    }
}

/// Status ids 1 (In Queue) and 2 (Processing) mean "poll again"
pub fn is_processing(status_id: u32) -> bool {
    status_id <= 2
}

/// Collapse provider status ids into the canonical categories
pub fn canonical_status(status_id: u32) -> OutcomeStatus {
    match status_id {
        3 => OutcomeStatus::Accepted,
        4 => OutcomeStatus::WrongAnswer,
        5 => OutcomeStatus::TimeLimitExceeded,
        6 => OutcomeStatus::CompilationError,
        // SIGSEGV, SIGXFSZ, SIGFPE, SIGABRT, NZEC, Other
        7..=12 => OutcomeStatus::RuntimeError,
        _ => OutcomeStatus::InternalError,
    }
}

/// Decode a base64 field. The provider wraps long values across lines, so
/// whitespace is dropped first; text that is not base64 is kept as-is.
pub fn decode(field: Option<&str>) -> String {
    let Some(raw) = field else {
        return String::new();
    };
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    match general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Sandbox client
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
    config: RemoteConfig,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self, ExecutionError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = header_value(key)?;
            headers.insert(HeaderName::from_static("x-rapidapi-key"), value.clone());
            headers.insert(HeaderName::from_static("x-auth-token"), value);
        }
        if let Some(host) = &config.api_host {
            headers.insert(HeaderName::from_static("x-rapidapi-host"), header_value(host)?);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ExecutionError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url, config })
    }

    /// Submit one case without waiting; returns the provider token
    pub async fn submit(&self, submission: &SandboxSubmission) -> Result<String, ExecutionError> {
        let url = format!("{}/submissions", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("base64_encoded", "true"), ("wait", "false")])
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::Transport(format!(
                "submit returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::InvalidResponse(format!("submit response: {}", e)))?;

        if token.token.is_empty() {
            return Err(ExecutionError::InvalidResponse("empty submission token".to_string()));
        }
        Ok(token.token)
    }

    /// Single status read for `token`
    pub async fn poll(&self, token: &str) -> Result<SandboxResult, ExecutionError> {
        let url = format!("{}/submissions/{}", self.base_url, token);

        let response = self
            .client
            .get(&url)
            .query(&[("base64_encoded", "true"), ("fields", POLL_FIELDS)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Transport(format!("poll returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| ExecutionError::InvalidResponse(format!("poll response: {}", e)))
    }

    /// Poll until the provider reports a final status or the bound is hit
    pub async fn wait_for(&self, token: &str) -> Result<SandboxResult, ExecutionError> {
        for attempt in 1..=self.config.max_poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            let result = self.poll(token).await?;
            if !is_processing(result.status.id) {
                return Ok(result);
            }
            debug!(token, attempt, status = %result.status.description, "Still processing");
        }

        Err(ExecutionError::Timeout {
            token: token.to_string(),
            attempts: self.config.max_poll_attempts,
        })
    }

    pub async fn run_case(
        &self,
        submission: &SandboxSubmission,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let token = self.submit(submission).await?;
        debug!(token = %token, "Submitted to sandbox");

        let result = self.wait_for(&token).await?;
        Ok(result.into_outcome())
    }
}

#[async_trait]
impl Executor for RemoteClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
        let total = request.submissions().len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, submission) in request.submissions().iter().enumerate() {
            let outcome = self.run_case(submission).await?;

            debug!(
                test_num = idx + 1,
                status = %outcome.status,
                elapsed_ms = outcome.elapsed_ms,
                memory_kb = outcome.memory_kb,
                "Remote test result"
            );

            let halt = should_halt(outcome.status, request.mode());
            let status = outcome.status;
            outcomes.push(outcome);

            if halt {
                warn!(
                    test_num = idx + 1,
                    total,
                    status = %status,
                    mode = %request.mode(),
                    "Stopping evaluation early"
                );
                break;
            }
        }

        info!(
            language = request.language(),
            executed = outcomes.len(),
            total,
            "Remote execution completed"
        );
        Ok(outcomes)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ExecutionError> {
    HeaderValue::from_str(value)
        .map_err(|e| ExecutionError::Transport(format!("invalid header value: {}", e)))
}
