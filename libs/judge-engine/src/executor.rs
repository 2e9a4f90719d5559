/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Run an ExecutionRequest on the remote sandbox and fall back to the local
/// executor when the remote path is unconfigured or fails.
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (remote client / fallback runtime)
/// - How verdicts are chosen (evaluator)

use crate::builder::ExecutionRequest;
use crate::error::ExecutionError;
use async_trait::async_trait;
use judge_common::types::{ExecutionBackend, ExecutionMode, ExecutionOutcome, OutcomeStatus};
use tracing::{error, info, warn};

/// Anything that turns a request into ordered per-case outcomes
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<ExecutionOutcome>, ExecutionError>;
}

/// Whether evaluation stops after a case with `status`.
///
/// Compilation is a property of the whole submission, so it always stops.
/// A runtime error stops Submit; Run keeps going to report every sample.
pub fn should_halt(status: OutcomeStatus, mode: ExecutionMode) -> bool {
    match status {
        OutcomeStatus::CompilationError => true,
        OutcomeStatus::RuntimeError => mode == ExecutionMode::Submit,
        _ => false,
    }
}

/// Outcomes plus where they came from
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcomes: Vec<ExecutionOutcome>,
    pub backend: ExecutionBackend,
    /// Operator-facing failure details; never part of a caller response
    pub diagnostics: Option<String>,
}

/// Execute `request` remotely if possible, locally otherwise.
///
/// Never fails: when both paths fail the returned execution has no outcomes,
/// `ExecutionBackend::None`, and the collected diagnostics.
pub async fn execute_with_fallback(
    request: &ExecutionRequest,
    remote: Option<&dyn Executor>,
    fallback: &dyn Executor,
) -> Execution {
    let mut diagnostics = Vec::new();

    if let Some(remote) = remote {
        match remote.execute(request).await {
            Ok(outcomes) => {
                return Execution {
                    outcomes,
                    backend: ExecutionBackend::Remote,
                    diagnostics: None,
                };
            }
            Err(e) => {
                warn!(
                    executor = remote.name(),
                    language = request.language(),
                    error = %e,
                    "Remote execution failed, falling back"
                );
                diagnostics.push(format!("{}: {}", remote.name(), e));
            }
        }
    } else {
        info!(language = request.language(), "Remote sandbox not configured, using fallback");
    }

    match fallback.execute(request).await {
        Ok(outcomes) => Execution {
            outcomes,
            backend: ExecutionBackend::Fallback,
            diagnostics: (!diagnostics.is_empty()).then(|| diagnostics.join("; ")),
        },
        Err(e) => {
            error!(
                executor = fallback.name(),
                language = request.language(),
                error = %e,
                "Fallback execution failed"
            );
            diagnostics.push(format!("{}: {}", fallback.name(), e));
            Execution {
                outcomes: Vec::new(),
                backend: ExecutionBackend::None,
                diagnostics: Some(diagnostics.join("; ")),
            }
        }
    }
}
