//! Execution provider seam.
//!
//! The provider compiles/runs submitted code and returns structured output.
//! It is consumed as a black box: one request per compile event, no retry.

use async_trait::async_trait;
use thiserror::Error;

/// A single execution request: the code the requester currently holds
/// locally, plus language/version/stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub version: String,
    pub stdin: String,
}

/// Failures talking to the execution provider.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Provider unreachable, or the request timed out.
    #[error("execution provider request failed: {0}")]
    Request(String),
    /// Provider answered with a non-success HTTP status.
    #[error("execution provider returned status {0}")]
    Status(u16),
    /// Provider answered, but not with the expected shape
    /// (a JSON object carrying a string at `run.output`).
    #[error("execution provider returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Gateway to the external execution provider.
///
/// On success the provider's JSON payload is returned unmodified so every
/// participant sees the exact provider response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<serde_json::Value, ExecutionError>;
}
