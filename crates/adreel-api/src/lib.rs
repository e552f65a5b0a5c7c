//! HTTP API server for AdReel.
//!
//! Surfaces ad creation in two modes: asynchronous (`202` + polling) and
//! streaming (`text/event-stream` carrying the pipeline's progress events).
//! The orchestrator task runs in-process; a client disconnect detaches the
//! stream only, never the job.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
