/// Docker fallback runtime
///
/// Runs the harness with `node -e` in a throwaway container:
/// - Network disabled
/// - Memory, CPU and pid limits enforced
/// - Read-only root filesystem
/// - Hard wall-clock timeout, container killed on expiry
/// - Container removed on drop, even on cancellation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::{debug, info, warn};

use super::harness::HARNESS_JS;
use super::{FallbackRuntime, HarnessInvocation, RawRun};
use crate::error::ExecutionError;

const MAX_SOURCE_BYTES: usize = 1024 * 1024;
const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Container start-up and Node boot on top of the case's own budget
const STARTUP_GRACE: Duration = Duration::from_secs(5);
/// Floor for the container memory limit; Node itself needs headroom
const MIN_MEMORY_BYTES: i64 = 64 * 1024 * 1024;
const NANO_CPUS: i64 = 500_000_000;
const PIDS_LIMIT: i64 = 64;

/// Removes the container when dropped
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let docker = self.docker.clone();
        let container_id = std::mem::take(&mut self.container_id);

        tokio::spawn(async move {
            let options = RemoveContainerOptions { force: true, ..Default::default() };
            if let Err(e) = docker.remove_container(&container_id, Some(options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to remove fallback container");
            }
        });
    }
}

pub struct DockerRuntime {
    docker: Docker,
    image: String,
}

impl DockerRuntime {
    pub fn connect(image: &str) -> Result<Self, ExecutionError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker, image: image.to_string() })
    }

    async fn ensure_image(&self) -> Result<(), ExecutionError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            debug!(image = %self.image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %self.image, "Image cache miss, pulling");
        let options = Some(CreateImageOptions {
            from_image: self.image.as_str(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }

        info!(image = %self.image, "Image pulled");
        Ok(())
    }

    async fn collect(&self, container_id: &str) -> (String, String, Option<i64>) {
        let mut stdout = String::new();
        let mut stderr = String::new();

        let logs_options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });
        let mut logs = self.docker.logs(container_id, logs_options);
        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => stdout.push_str(&String::from_utf8_lossy(&message)),
                Ok(LogOutput::StdErr { message }) => stderr.push_str(&String::from_utf8_lossy(&message)),
                Ok(_) => {}
                Err(e) => {
                    warn!(container_id, error = %e, "Error reading container logs");
                    break;
                }
            }
        }

        let wait_options = Some(WaitContainerOptions { condition: "not-running" });
        let exit_code = match self.docker.wait_container(container_id, wait_options).next().await {
            Some(Ok(response)) => Some(response.status_code),
            // Non-zero exits surface as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Some(code),
            Some(Err(e)) => {
                warn!(container_id, error = %e, "Failed to read container exit code");
                None
            }
            None => None,
        };

        (stdout, stderr, exit_code)
    }
}

#[async_trait]
impl FallbackRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn invoke(&self, invocation: &HarnessInvocation) -> Result<RawRun, ExecutionError> {
        if invocation.source_b64.len() > MAX_SOURCE_BYTES * 4 / 3 + 4 {
            return Err(ExecutionError::Runtime(format!(
                "source exceeds {} bytes",
                MAX_SOURCE_BYTES
            )));
        }
        if invocation.stdin_b64.len() > MAX_INPUT_BYTES * 4 / 3 + 4 {
            return Err(ExecutionError::Runtime(format!(
                "input exceeds {} bytes",
                MAX_INPUT_BYTES
            )));
        }

        self.ensure_image().await?;

        let memory = ((invocation.memory_limit_kb as i64) * 1024).max(MIN_MEMORY_BYTES);
        let env = invocation
            .env()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(vec!["node".to_string(), "-e".to_string(), HARNESS_JS.to_string()]),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(memory),
                memory_swap: Some(memory),
                nano_cpus: Some(NANO_CPUS),
                pids_limit: Some(PIDS_LIMIT),
                readonly_rootfs: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let name = format!("judge-fallback-{}", uuid::Uuid::new_v4());
        let container = self
            .docker
            .create_container(Some(CreateContainerOptions { name: name.as_str(), platform: None }), config)
            .await?;
        let container_id = container.id;
        let _guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container_id.clone(),
        };

        let started = Instant::now();
        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await?;

        let budget = invocation.time_limit + STARTUP_GRACE;
        match tokio::time::timeout(budget, self.collect(&container_id)).await {
            Ok((stdout, stderr, exit_code)) => {
                debug!(container_id = %container_id, ?exit_code, "Fallback container exited");
                Ok(RawRun {
                    stdout,
                    stderr,
                    exit_code,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(container_id = %container_id, budget_ms = budget.as_millis() as u64, "Fallback container timed out, killing");
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = %container_id, error = %e, "Failed to kill timed-out container");
                }
                Ok(RawRun {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::encode;

    fn invocation(source: &str, stdin: &str) -> HarnessInvocation {
        HarnessInvocation {
            source_b64: encode(source),
            stdin_b64: encode(stdin),
            entry_point: "twoSum".to_string(),
            time_limit: Duration::from_secs(2),
            memory_limit_kb: 128_000,
        }
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_docker_runs_entry_point() {
        let runtime = DockerRuntime::connect("node:20-alpine").unwrap();
        let source = "function twoSum(nums, target) { const seen = new Map(); for (let i = 0; i < nums.length; i++) { if (seen.has(target - nums[i])) return [seen.get(target - nums[i]), i]; seen.set(nums[i], i); } }";

        let raw = runtime.invoke(&invocation(source, "[2,7,11,15]\n9")).await.unwrap();

        assert!(!raw.timed_out);
        let report = super::super::harness::parse_report(&raw.stdout).unwrap();
        assert_eq!(report.output.as_deref(), Some("[0,1]"));
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_docker_rejects_oversized_input() {
        let runtime = DockerRuntime::connect("node:20-alpine").unwrap();
        let huge = "1".repeat(MAX_INPUT_BYTES + 16);

        let err = runtime.invoke(&invocation("function twoSum() {}", &huge)).await.unwrap_err();

        assert!(matches!(err, ExecutionError::Runtime(_)));
    }
}
