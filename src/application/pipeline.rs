use crate::adapters::fs::{remove_if_exists, wait_for_file};
use crate::config::RelayConfig;
use crate::domain::job::{draft_job, new_job_id, ExecutionSettings, FaceSettings, JobRequest};
use crate::error::Result;
use crate::ports::forwarder::ResultForwarder;
use crate::ports::runner::FusionRunner;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

const OUTPUT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings the pipeline reads on every job.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub job_template: PathBuf,
    pub drafted_dir: PathBuf,
    pub job_id_length: usize,
    pub face: FaceSettings,
    pub execution: ExecutionSettings,
    pub output_wait: Duration,
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
}

impl From<&RelayConfig> for PipelineSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            job_template: config.job_template.clone(),
            drafted_dir: config.drafted_dir.clone(),
            job_id_length: config.job_id_length,
            face: config.face.clone(),
            execution: config.execution.clone(),
            output_wait: config.output_wait,
            poll_interval: OUTPUT_POLL_INTERVAL,
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    pub output_path: PathBuf,
    pub forward_status: u16,
}

/// Drafts, runs and forwards one FaceFusion job at a time per permit.
pub struct PipelineService {
    runner: Arc<dyn FusionRunner>,
    forwarder: Arc<dyn ResultForwarder>,
    settings: PipelineSettings,
    permits: Semaphore,
    // one in-flight request per output file, from stale removal to forward
    outputs: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PipelineService {
    pub fn new(
        runner: Arc<dyn FusionRunner>,
        forwarder: Arc<dyn ResultForwarder>,
        settings: PipelineSettings,
    ) -> Self {
        let permits = Semaphore::new(settings.max_concurrent_jobs.max(1));
        Self {
            runner,
            forwarder,
            settings,
            permits,
            outputs: Mutex::new(HashMap::new()),
        }
    }

    async fn output_lock(&self, output: &Path) -> Arc<Mutex<()>> {
        self.outputs
            .lock()
            .await
            .entry(output.to_path_buf())
            .or_default()
            .clone()
    }

    /// Write a drafted job for `source` onto `target`, returning its id.
    pub async fn draft(&self, source: &Path, target: &Path, output: &Path) -> Result<String> {
        let job_id = new_job_id(self.settings.job_id_length);
        let request = JobRequest {
            source_path: source.to_path_buf(),
            target_path: target.to_path_buf(),
            output_path: output.to_path_buf(),
            face: self.settings.face.clone(),
        };
        draft_job(
            &self.settings.job_template,
            &self.settings.drafted_dir,
            &job_id,
            &request,
        )
        .await?;
        Ok(job_id)
    }

    /// Submit and run an already drafted job.
    pub async fn execute(&self, job_id: &str) -> Result<()> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        self.runner.submit(job_id).await?;
        self.runner.run(job_id, &self.settings.execution).await
    }

    pub async fn forward(&self, output: &Path) -> Result<u16> {
        self.forwarder.forward(output).await
    }

    /// Full request path: draft, run, wait for the video, forward it.
    pub async fn process(&self, source: &Path, target: &Path, output: &Path) -> Result<JobOutcome> {
        let slot = self.output_lock(output).await;
        let _claimed = slot.lock().await;

        remove_if_exists(output).await?;

        let job_id = self.draft(source, target, output).await?;
        self.execute(&job_id).await?;

        wait_for_file(output, self.settings.output_wait, self.settings.poll_interval).await?;

        #[cfg(feature = "probe")]
        {
            let info = crate::adapters::probe::probe_video(output).await?;
            tracing::info!(
                "Output {:?}: {}x{}, {:.1}s",
                output,
                info.width,
                info.height,
                info.duration_secs
            );
        }

        let forward_status = self.forward(output).await?;
        tracing::info!("Job {} done, result path is {:?}", job_id, output);

        Ok(JobOutcome {
            job_id,
            output_path: output.to_path_buf(),
            forward_status,
        })
    }
}
