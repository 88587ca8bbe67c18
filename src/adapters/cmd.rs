use crate::domain::job::ExecutionSettings;
use crate::error::{RelayError, Result};
use crate::ports::runner::FusionRunner;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command as TokioCommand;

const STDERR_TAIL: usize = 2000;

// Raw process execution, split out so the status handling can be tested
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: &[String]) -> io::Result<Output>;
}

/// Launches `{python} {script} <args>` inside the FaceFusion checkout.
pub struct PythonExecutor {
    pub python_bin: String,
    pub script: String,
    pub workdir: PathBuf,
}

#[async_trait]
impl ToolExecutor for PythonExecutor {
    async fn execute(&self, args: &[String]) -> io::Result<Output> {
        TokioCommand::new(&self.python_bin)
            .arg(&self.script)
            .args(args)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// FaceFusion's job commands on top of any executor.
pub struct FaceFusionCli<E> {
    executor: E,
}

impl FaceFusionCli<PythonExecutor> {
    pub fn from_config(config: &crate::config::RelayConfig) -> Self {
        Self::new(PythonExecutor {
            python_bin: config.python_bin.clone(),
            script: config.facefusion_script.clone(),
            workdir: config.facefusion_dir.clone(),
        })
    }
}

impl<E: ToolExecutor> FaceFusionCli<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    async fn step(&self, step: &'static str, job_id: &str, args: Vec<String>) -> Result<()> {
        tracing::debug!("Running {} with {:?}", step, args);
        let output = self.executor.execute(&args).await.map_err(|e| RelayError::Tool {
            step,
            job_id: job_id.to_string(),
            code: None,
            stderr: format!("could not start tool: {}", e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::debug!("[{} stdout] {}", step, stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            tracing::debug!("[{} stderr] {}", step, stderr.trim_end());
        }

        if !output.status.success() {
            tracing::error!("{} failed for job {}: {}", step, job_id, output.status);
            return Err(RelayError::Tool {
                step,
                job_id: job_id.to_string(),
                code: output.status.code(),
                stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<E: ToolExecutor> FusionRunner for FaceFusionCli<E> {
    async fn submit(&self, job_id: &str) -> Result<()> {
        self.step("job-submit", job_id, submit_args(job_id)).await?;
        tracing::info!("Job {} submitted", job_id);
        Ok(())
    }

    async fn run(&self, job_id: &str, settings: &ExecutionSettings) -> Result<()> {
        self.step("job-run", job_id, run_args(job_id, settings)).await?;
        tracing::info!("Job {} executed with settings: {:?}", job_id, settings);
        Ok(())
    }
}

pub fn submit_args(job_id: &str) -> Vec<String> {
    vec![String::from("job-submit"), job_id.to_string()]
}

pub fn run_args(job_id: &str, settings: &ExecutionSettings) -> Vec<String> {
    let mut args = vec![String::from("job-run"), job_id.to_string()];
    args.extend(settings.to_args());
    args
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
