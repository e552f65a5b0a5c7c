//! Structured job logging.

use tracing::{error, info, warn};

use adreel_models::JobId;

/// Job logger with consistent contextual fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    /// Create a logger for one job.
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    pub fn step(&self, step: &str, message: &str) {
        info!(job_id = %self.job_id, step = %step, "{}", message);
    }

    pub fn warn(&self, step: &str, message: &str) {
        warn!(job_id = %self.job_id, step = %step, "{}", message);
    }

    pub fn error(&self, step: &str, message: &str) {
        error!(job_id = %self.job_id, step = %step, "{}", message);
    }
}
