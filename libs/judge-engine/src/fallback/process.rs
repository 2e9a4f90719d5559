/// Subprocess fallback runtime
///
/// Spawns the local Node binary per case with a heap cap, a scrubbed
/// environment and a wall-clock timeout. No OS-level isolation; development
/// deployments only.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::harness::HARNESS_JS;
use super::{FallbackRuntime, HarnessInvocation, RawRun};
use crate::error::ExecutionError;

/// Node boot on top of the case's own budget
const STARTUP_GRACE: Duration = Duration::from_secs(2);
const MIN_HEAP_MB: u64 = 32;

pub struct ProcessRuntime {
    node_binary: String,
}

impl ProcessRuntime {
    pub fn new(node_binary: &str) -> Self {
        Self { node_binary: node_binary.to_string() }
    }
}

#[async_trait]
impl FallbackRuntime for ProcessRuntime {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn invoke(&self, invocation: &HarnessInvocation) -> Result<RawRun, ExecutionError> {
        let heap_mb = (invocation.memory_limit_kb / 1024).max(MIN_HEAP_MB);

        let mut command = Command::new(&self.node_binary);
        command
            .arg(format!("--max-old-space-size={}", heap_mb))
            .arg("-e")
            .arg(HARNESS_JS)
            .env_clear()
            .envs(invocation.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }

        let started = Instant::now();
        let child = command
            .spawn()
            .map_err(|e| ExecutionError::Runtime(format!("failed to spawn {}: {}", self.node_binary, e)))?;

        let budget = invocation.time_limit + STARTUP_GRACE;
        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(status = ?output.status, "Fallback process exited");
                Ok(RawRun {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().map(i64::from),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(ExecutionError::Runtime(format!("failed to wait for node: {}", e))),
            Err(_) => {
                // Dropping the future kills the child
                warn!(budget_ms = budget.as_millis() as u64, "Fallback process timed out");
                Ok(RawRun {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }
}
