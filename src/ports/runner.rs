use crate::domain::job::ExecutionSettings;
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FusionRunner: Send + Sync {
    /// Move a drafted job into the tool's queue
    async fn submit(&self, job_id: &str) -> Result<()>;

    /// Execute a queued job to completion
    async fn run(&self, job_id: &str, settings: &ExecutionSettings) -> Result<()>;
}
