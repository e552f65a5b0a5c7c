//! At-most-one orchestrator task per job.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use adreel_models::JobId;

use crate::error::{PipelineError, PipelineResult};

/// In-process registry of live orchestrator tasks.
///
/// A second admission for a job that already has a running task is
/// rejected. Combined with the job store's last-writer-wins contract this
/// enforces the single-writer invariant without a distributed lease.
#[derive(Clone, Default)]
pub struct JobRegistry {
    live: Arc<Mutex<HashSet<String>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lease for a job. The lease releases on drop.
    pub fn acquire(&self, job_id: &JobId) -> PipelineResult<JobLease> {
        let mut live = self.live.lock().expect("registry poisoned");
        if !live.insert(job_id.to_string()) {
            return Err(PipelineError::AlreadyRunning(job_id.clone()));
        }
        Ok(JobLease {
            registry: self.clone(),
            job_id: job_id.to_string(),
        })
    }

    fn release(&self, job_id: &str) {
        let mut live = self.live.lock().expect("registry poisoned");
        live.remove(job_id);
    }
}

/// Lease held by the single orchestrator task of a job.
pub struct JobLease {
    registry: JobRegistry,
    job_id: String,
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.registry.release(&self.job_id);
    }
}
