//! Typed repository for ad job documents.

use tracing::info;

use adreel_models::{AdJob, JobId, JobStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{document_to_json, json_to_fields};

/// Repository for one user's ad job documents.
///
/// Documents live at `users/{user_id}/ad_jobs/{job_id}`. The orchestrator
/// is the sole writer per job; `save` is a plain last-writer-wins upsert.
pub struct JobRepository {
    client: FirestoreClient,
    retry: RetryConfig,
    user_id: String,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
            user_id: user_id.into(),
        }
    }

    /// Collection path for the user's ad jobs.
    fn collection(&self) -> String {
        format!("users/{}/ad_jobs", self.user_id)
    }

    /// Upsert the full job document.
    ///
    /// The job never carries media bytes, so the serialized document stays
    /// far below the per-document size limit.
    pub async fn save(&self, job: &AdJob) -> FirestoreResult<()> {
        let json = serde_json::to_value(job)?;
        let collection = self.collection();
        let doc_id = job.job_id.to_string();

        with_retry(&self.retry, "job_save", || {
            let fields = json_to_fields(&json);
            let collection = collection.clone();
            let doc_id = doc_id.clone();
            async move {
                self.client.set_document(&collection, &doc_id, fields?).await?;
                Ok(())
            }
        })
        .await?;

        info!(job_id = %job.job_id, status = %job.status, progress = job.progress, "Saved job document");
        Ok(())
    }

    /// Load a job by ID.
    pub async fn load(&self, job_id: &JobId) -> FirestoreResult<Option<AdJob>> {
        let collection = self.collection();
        let doc = with_retry(&self.retry, "job_load", || {
            let collection = collection.clone();
            async move { self.client.get_document(&collection, job_id.as_str()).await }
        })
        .await?;

        match doc {
            Some(d) => {
                let json = document_to_json(&d)?;
                let job: AdJob = serde_json::from_value(json)
                    .map_err(|e| FirestoreError::serialization(e.to_string()))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Load a job, failing when it does not exist.
    pub async fn load_required(&self, job_id: &JobId) -> FirestoreResult<AdJob> {
        self.load(job_id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", self.collection(), job_id)))
    }

    /// List the user's jobs, optionally filtered by status, newest first.
    pub async fn list_for_user(&self, status: Option<JobStatus>) -> FirestoreResult<Vec<AdJob>> {
        let docs = self.client.list_documents(&self.collection()).await?;

        let mut jobs = Vec::with_capacity(docs.len());
        for doc in &docs {
            let json = document_to_json(doc)?;
            match serde_json::from_value::<AdJob>(json) {
                Ok(job) => {
                    if status.map_or(true, |s| job.status == s) {
                        jobs.push(job);
                    }
                }
                // Skip malformed documents rather than failing the listing
                Err(e) => tracing::warn!("Skipping malformed job document: {}", e),
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
