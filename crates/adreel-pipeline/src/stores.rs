//! Production implementations of the storage contracts.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use adreel_firestore::{FirestoreClient, JobRepository};
use adreel_models::{AdJob, JobId};
use adreel_storage::{ArtifactPaths, R2Client};

use crate::error::PipelineResult;
use crate::traits::{ArtifactStore, JobStore};

/// R2-backed artifact store.
#[derive(Clone)]
pub struct R2ArtifactStore {
    client: R2Client,
}

impl R2ArtifactStore {
    pub fn new(client: R2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStore for R2ArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> PipelineResult<()> {
        self.client.upload_bytes(bytes, key, content_type).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> PipelineResult<Vec<u8>> {
        Ok(self.client.download_bytes(key).await?)
    }

    async fn existing_clip_indices(&self, paths: &ArtifactPaths) -> PipelineResult<BTreeSet<u32>> {
        Ok(self.client.list_clip_indices(paths).await?)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> PipelineResult<String> {
        Ok(self.client.presign_get(key, ttl).await?)
    }
}

/// Firestore-backed job store.
#[derive(Clone)]
pub struct FirestoreJobStore {
    client: FirestoreClient,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    async fn save(&self, job: &AdJob) -> PipelineResult<()> {
        let repo = JobRepository::new(self.client.clone(), &job.user_id);
        repo.save(job).await?;
        Ok(())
    }

    async fn load(&self, user_id: &str, job_id: &JobId) -> PipelineResult<Option<AdJob>> {
        let repo = JobRepository::new(self.client.clone(), user_id);
        Ok(repo.load(job_id).await?)
    }
}
