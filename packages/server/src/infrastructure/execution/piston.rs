//! Piston execution provider client.
//!
//! Forwards a single `{language, version, files: [{content}], stdin}` request
//! to the provider and relays its JSON response unmodified. One attempt per
//! request; the HTTP client carries an explicit bounded timeout so an
//! unresponsive provider cannot hold a connection's event loop forever.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{ExecutionError, ExecutionGateway, ExecutionRequest};

/// Public Piston instance, same endpoint the original deployment used.
pub const DEFAULT_ENDPOINT: &str = "https://emkc.org/api/v2/piston/execute";

#[derive(Debug, Serialize)]
struct PistonFile<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct PistonRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<PistonFile<'a>>,
    stdin: &'a str,
}

/// `ExecutionGateway` backed by a Piston-compatible HTTP endpoint.
pub struct PistonExecutionGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl PistonExecutionGateway {
    /// Create a gateway for the given endpoint with a bounded request timeout.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Request(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ExecutionGateway for PistonExecutionGateway {
    async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<serde_json::Value, ExecutionError> {
        let body = PistonRequest {
            language: &request.language,
            version: &request.version,
            files: vec![PistonFile {
                content: &request.code,
            }],
            stdin: &request.stdin,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Status(status.as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        validate_response(&payload)?;

        Ok(payload)
    }
}

/// A provider response must carry a string at `run.output`; anything else is
/// a protocol violation and fails the request.
fn validate_response(payload: &serde_json::Value) -> Result<(), ExecutionError> {
    match payload.pointer("/run/output") {
        Some(output) if output.is_string() => Ok(()),
        Some(_) => Err(ExecutionError::MalformedResponse(
            "run.output is not a string".to_string(),
        )),
        None => Err(ExecutionError::MalformedResponse(
            "missing run.output".to_string(),
        )),
    }
}
