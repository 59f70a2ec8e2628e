pub mod http;

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::program::{ExtractionProgram, Submission};

/// Remote job lifecycle as reported by the actor platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl RunStatus {
    /// Unknown strings (e.g. transitional ABORTING/TIMING-OUT) count as
    /// still running; polling continues until the deadline.
    pub fn parse(s: &str) -> Self {
        match s {
            "READY" => Self::Queued,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "ABORTED" => Self::Aborted,
            "TIMED-OUT" => Self::TimedOut,
            _ => Self::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Aborted | Self::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
            Self::TimedOut => "TIMED-OUT",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct JobHandle {
    pub run_id: String,
    pub dataset_id: String,
}

/// The actor platform surface: submit a run, poll it, read its dataset.
/// Abstracted so pipeline tests can stand in a fake platform.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn whoami(&self) -> Result<String>;
    async fn submit(&self, actor_id: &str, input: &Value) -> Result<JobHandle>;
    async fn status(&self, run_id: &str) -> Result<(RunStatus, String)>;
    async fn items(&self, dataset_id: &str) -> Result<Vec<Value>>;
}

/// Turns one chunk of submissions into a completed remote job's items.
///
/// Every failure path (submit error, poll deadline, non-success terminal
/// state, dataset fetch error) collapses to an empty item list after a
/// warning: a failed chunk is "no new information", never fatal.
pub struct ExtractionClient {
    api: Box<dyn JobApi>,
    poll_interval: Duration,
}

impl ExtractionClient {
    pub fn new(api: Box<dyn JobApi>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    pub async fn verify_connection(&self) -> Result<String> {
        self.api.whoami().await
    }

    pub async fn run_chunk(
        &self,
        program: &ExtractionProgram,
        submissions: &[Submission],
    ) -> Vec<Value> {
        match self.try_run(program, submissions).await {
            Ok(items) => items,
            Err(e) => {
                warn!("{} job yielded no results: {e:#}", program.name);
                Vec::new()
            }
        }
    }

    async fn try_run(
        &self,
        program: &ExtractionProgram,
        submissions: &[Submission],
    ) -> Result<Vec<Value>> {
        let input = program.run_input(submissions);
        let start = Instant::now();
        let handle = self.api.submit(program.actor_id, &input).await?;
        info!(
            "{}: submitted {} URLs as run {}",
            program.name,
            submissions.len(),
            handle.run_id
        );

        let status = self.wait(&handle.run_id, program.job_timeout).await?;
        info!(
            "{}: run {} finished {} in {:.1}s",
            program.name,
            handle.run_id,
            status,
            start.elapsed().as_secs_f64()
        );
        if status != RunStatus::Succeeded {
            bail!("run {} ended {}", handle.run_id, status);
        }

        let items = self.api.items(&handle.dataset_id).await?;
        info!("{}: retrieved {} items", program.name, items.len());
        Ok(items)
    }

    /// Fixed-interval poll until a terminal status or the job deadline.
    /// Individual poll errors are logged and retried on the next tick.
    async fn wait(&self, run_id: &str, timeout: Duration) -> Result<RunStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.api.status(run_id).await {
                Ok((status, message)) => {
                    if message.is_empty() {
                        info!("run {}: {}", run_id, status);
                    } else {
                        info!("run {}: {} | {}", run_id, status, message);
                    }
                    if status.is_terminal() {
                        return Ok(status);
                    }
                }
                Err(e) => warn!("run {}: poll error: {e:#}", run_id),
            }
            if Instant::now() >= deadline {
                bail!("gave up waiting after {}s", timeout.as_secs());
            }
            sleep(self.poll_interval).await;
        }
    }
}

// ── Tests ──
