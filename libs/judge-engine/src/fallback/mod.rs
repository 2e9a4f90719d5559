/// Local Fallback Executor
///
/// **Core Responsibility:**
/// Judge the reference language (JavaScript) without the remote sandbox.
///
/// **Behaviour:**
/// - Each case calls the problem's declared entry point in a fresh `vm`
///   context inside a fresh runtime (container or process)
/// - Console output is silenced; only the return value is compared
/// - The return value is serialized to text and compared after trimming,
///   exact textual match only
/// - A thrown exception is a RuntimeError for that case; Submit stops there,
///   Run reports every sample
///
/// **Limitations:**
/// This is a degraded-service path. Only `DockerRuntime` applies OS-enforced
/// limits; `ProcessRuntime` is for development and must never see
/// adversarial input.

pub mod docker;
pub mod harness;
pub mod process;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use judge_common::config::{FallbackKind, FallbackSettings};
use judge_common::types::{ExecutionOutcome, OutcomeStatus, ProviderStatus, TestCase};
use tracing::{debug, info, warn};

use crate::builder::{encode, ExecutionRequest};
use crate::error::ExecutionError;
use crate::evaluator::normalize_output;
use crate::executor::{should_halt, Executor};
use crate::languages::FALLBACK_LANGUAGE;
use harness::{parse_report, HarnessReport, Phase};

pub use docker::DockerRuntime;
pub use process::ProcessRuntime;

/// One harness call: a single test case against the user's entry point
#[derive(Debug, Clone)]
pub struct HarnessInvocation {
    pub source_b64: String,
    pub stdin_b64: String,
    pub entry_point: String,
    /// Budget for the entry-point call itself
    pub time_limit: Duration,
    pub memory_limit_kb: u64,
}

impl HarnessInvocation {
    /// Environment handed to the harness
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("JUDGE_SOURCE", self.source_b64.clone()),
            ("JUDGE_STDIN", self.stdin_b64.clone()),
            ("JUDGE_ENTRY", self.entry_point.clone()),
            ("JUDGE_TIMEOUT_MS", self.time_limit.as_millis().to_string()),
        ]
    }
}

/// What a runtime observed from one harness process
#[derive(Debug, Clone, Default)]
pub struct RawRun {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
    pub elapsed_ms: u64,
    /// Killed by the runtime's wall-clock bound
    pub timed_out: bool,
}

/// Something that can run the harness once in isolation
#[async_trait]
pub trait FallbackRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invoke(&self, invocation: &HarnessInvocation) -> Result<RawRun, ExecutionError>;
}

// Provider-style ids so fallback outcomes read like sandbox ones
const STATUS_ACCEPTED: u32 = 3;
const STATUS_WRONG_ANSWER: u32 = 4;
const STATUS_TIME_LIMIT: u32 = 5;
const STATUS_COMPILATION: u32 = 6;
const STATUS_RUNTIME: u32 = 11;
const STATUS_INTERNAL: u32 = 13;

pub struct LocalFallbackExecutor {
    runtime: Arc<dyn FallbackRuntime>,
}

impl LocalFallbackExecutor {
    pub fn new(runtime: Arc<dyn FallbackRuntime>) -> Self {
        Self { runtime }
    }

    pub fn from_settings(settings: &FallbackSettings) -> Result<Self, ExecutionError> {
        let runtime: Arc<dyn FallbackRuntime> = match settings.kind {
            FallbackKind::Docker => Arc::new(DockerRuntime::connect(&settings.image)?),
            FallbackKind::Process => Arc::new(ProcessRuntime::new(&settings.node_binary)),
        };
        info!(runtime = runtime.name(), "Fallback runtime configured");
        Ok(Self::new(runtime))
    }

    async fn run_case(
        &self,
        request: &ExecutionRequest,
        entry_point: &str,
        test_case: &TestCase,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let limits = request.limits();
        let invocation = HarnessInvocation {
            source_b64: encode(request.source_code()),
            stdin_b64: encode(&test_case.input),
            entry_point: entry_point.to_string(),
            time_limit: Duration::from_secs_f64(limits.time_limit_seconds.max(0.001)),
            memory_limit_kb: limits.memory_limit_kb,
        };

        let raw = self.runtime.invoke(&invocation).await?;
        Ok(classify(raw, test_case))
    }
}

/// Turn a raw harness run into a canonical outcome for `test_case`
pub fn classify(raw: RawRun, test_case: &TestCase) -> ExecutionOutcome {
    let report = parse_report(&raw.stdout);
    let elapsed_ms = report
        .as_ref()
        .and_then(|r| r.elapsed_ms)
        .unwrap_or(raw.elapsed_ms);
    let memory_kb = report.as_ref().and_then(|r| r.memory_kb).unwrap_or(0);

    let outcome = |status: OutcomeStatus, id: u32, stdout: String, stderr: String, compile: Option<String>| {
        ExecutionOutcome {
            stdout,
            stderr,
            compile_output: compile,
            elapsed_ms,
            memory_kb,
            exit_code: raw.exit_code,
            status,
            provider_status: ProviderStatus { id, description: status.to_string() },
        }
    };

    if raw.timed_out {
        return outcome(
            OutcomeStatus::TimeLimitExceeded,
            STATUS_TIME_LIMIT,
            String::new(),
            "[Execution timed out]".to_string(),
            None,
        );
    }

    match report {
        Some(HarnessReport { ok: true, output, .. }) => {
            let actual = output.unwrap_or_default();
            let (status, id) = match test_case.expected_output.as_deref() {
                Some(expected) if normalize_output(&actual) != normalize_output(expected) => {
                    (OutcomeStatus::WrongAnswer, STATUS_WRONG_ANSWER)
                }
                _ => (OutcomeStatus::Accepted, STATUS_ACCEPTED),
            };
            outcome(status, id, actual, raw.stderr, None)
        }
        Some(HarnessReport { ok: false, phase, error, .. }) => {
            let error = error.unwrap_or_default();
            match phase {
                Some(Phase::Compile) => outcome(
                    OutcomeStatus::CompilationError,
                    STATUS_COMPILATION,
                    String::new(),
                    raw.stderr,
                    Some(error),
                ),
                Some(Phase::Timeout) => outcome(
                    OutcomeStatus::TimeLimitExceeded,
                    STATUS_TIME_LIMIT,
                    String::new(),
                    error,
                    None,
                ),
                Some(Phase::Setup) => outcome(
                    OutcomeStatus::InternalError,
                    STATUS_INTERNAL,
                    String::new(),
                    error,
                    None,
                ),
                Some(Phase::Run) | None => outcome(
                    OutcomeStatus::RuntimeError,
                    STATUS_RUNTIME,
                    String::new(),
                    error,
                    None,
                ),
            }
        }
        None => {
            // Harness died before reporting: OOM kill, signal, broken runtime
            let mut stderr = raw.stderr.clone();
            match raw.exit_code {
                Some(137) => stderr.push_str("\n[Killed: likely exceeded memory limit]"),
                Some(139) => stderr.push_str("\n[Killed: segmentation fault]"),
                _ => {}
            }
            if raw.exit_code.unwrap_or(0) != 0 {
                outcome(OutcomeStatus::RuntimeError, STATUS_RUNTIME, String::new(), stderr, None)
            } else {
                stderr.push_str("\n[Harness produced no report]");
                outcome(OutcomeStatus::InternalError, STATUS_INTERNAL, String::new(), stderr, None)
            }
        }
    }
}

#[async_trait]
impl Executor for LocalFallbackExecutor {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
        if request.language() != FALLBACK_LANGUAGE {
            return Err(ExecutionError::UnsupportedLanguage(request.language().to_string()));
        }
        let entry_point = request.entry_point();
        if entry_point.trim().is_empty() {
            return Err(ExecutionError::MissingEntryPoint);
        }

        let total = request.test_cases().len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, test_case) in request.test_cases().iter().enumerate() {
            let outcome = self.run_case(request, entry_point, test_case).await?;

            debug!(
                runtime = self.runtime.name(),
                test_num = idx + 1,
                status = %outcome.status,
                elapsed_ms = outcome.elapsed_ms,
                "Fallback test result"
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
            runtime = self.runtime.name(),
            executed = outcomes.len(),
            total,
            "Fallback execution completed"
        );
        Ok(outcomes)
    }
}
