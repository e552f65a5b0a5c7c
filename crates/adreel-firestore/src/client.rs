//! Firestore REST API client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::TokenProvider;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::types::{Document, ListDocumentsResponse, Value};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        Ok(Self {
            project_id: std::env::var("GCP_PROJECT_ID")
                .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
                .map_err(|_| FirestoreError::auth_error("GCP_PROJECT_ID not set"))?,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
        })
    }
}

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    auth: Arc<dyn TokenProvider>,
    base_url: String,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            auth: Arc::clone(&self.auth),
            base_url: self.base_url.clone(),
        }
    }
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = gcp_auth::provider()
            .await
            .map_err(|e| FirestoreError::auth_error(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );

        Ok(Self {
            http,
            auth,
            base_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    /// Get an access token.
    async fn get_token(&self) -> FirestoreResult<String> {
        let token = self
            .auth
            .token(&["https://www.googleapis.com/auth/datastore"])
            .await
            .map_err(|e| FirestoreError::auth_error(e.to_string()))?;
        Ok(token.as_str().to_string())
    }

    /// Build document path.
    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Map a non-success HTTP status to an error, honoring Retry-After.
    async fn error_for_status(
        url: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> FirestoreError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return FirestoreError::RateLimited(retry_after_ms);
        }
        if status == StatusCode::FORBIDDEN {
            return FirestoreError::PermissionDenied(url.to_string());
        }
        if status.is_server_error() {
            return FirestoreError::ServerError(status.as_u16());
        }
        let body = response.text().await.unwrap_or_default();
        FirestoreError::request_failed(format!("{} failed with {}: {}", url, status, body))
    }

    /// Get a document.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);
        let token = self.get_token().await?;

        let started = Instant::now();
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let status = response.status();
        record_request("get_document", status.as_u16(), started.elapsed().as_millis() as f64);

        match status {
            StatusCode::OK => {
                let doc: Document = response.json().await?;
                Ok(Some(doc))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::error_for_status(&url, status, response).await),
        }
    }

    /// Set a document (upsert, last-writer-wins).
    ///
    /// PATCH without a precondition creates the document when missing and
    /// replaces its fields when present.
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_path(collection, doc_id);
        let token = self.get_token().await?;

        let body = Document::new(fields);

        let started = Instant::now();
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        record_request("set_document", status.as_u16(), started.elapsed().as_millis() as f64);

        match status {
            StatusCode::OK => {
                let doc: Document = response.json().await?;
                debug!("Saved document {}/{}", collection, doc_id);
                Ok(doc)
            }
            status => Err(Self::error_for_status(&url, status, response).await),
        }
    }

    /// List documents in a collection, following pagination.
    pub async fn list_documents(&self, collection: &str) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}/{}", self.base_url, collection);
        let token = self.get_token().await?;

        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("pageSize", "100")]);
            if let Some(ref t) = page_token {
                request = request.query(&[("pageToken", t.as_str())]);
            }

            let started = Instant::now();
            let response = request.send().await?;
            let status = response.status();
            record_request("list_documents", status.as_u16(), started.elapsed().as_millis() as f64);

            if status == StatusCode::NOT_FOUND {
                // Empty collection paths 404 on some databases; treat as empty
                return Ok(documents);
            }
            if status != StatusCode::OK {
                return Err(Self::error_for_status(&url, status, response).await);
            }

            let page: ListDocumentsResponse = response.json().await?;
            documents.extend(page.documents.unwrap_or_default());

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        Ok(documents)
    }
}
