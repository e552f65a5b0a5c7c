//! Firestore REST API client.
//!
//! Durable job-document storage for the ad pipeline:
//! - `client` - Firestore REST API client (gcp_auth bearer tokens)
//! - `types` - Firestore document types and value conversions
//! - `retry` - Retry policy with exponential backoff and jitter
//! - `metrics` - Prometheus metrics collection
//! - `job_repo` - Typed repository for ad job documents
//!
//! Job documents are small by contract: media bytes live in object storage
//! and are referenced by URL. The orchestrator is the sole writer per job,
//! so `save` is plain last-writer-wins.

pub mod client;
pub mod error;
pub mod job_repo;
pub mod metrics;
pub mod retry;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::JobRepository;
pub use retry::RetryConfig;
pub use types::{json_to_value, value_to_json, Document, Value};
