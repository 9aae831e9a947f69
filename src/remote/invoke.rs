//! Invocation transport: one request, one response, no retries.
//!
//! [`Invoker`] is the seam the session talks through. [`HttpInvoker`] is the
//! production implementation, posting JSON to a single endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::RemoteConfig;
use super::errors::RemoteError;
use super::RemoteId;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Describes one remote operation: its name, result type and declared
/// argument types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationType {
    pub name: String,
    pub result_type: String,
    pub arg_signature: Vec<String>,
}

impl OperationType {
    /// Create an operation descriptor.
    pub fn new(name: &str, result_type: &str, arg_signature: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            result_type: result_type.to_string(),
            arg_signature: arg_signature.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A method call on one remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub remote_id: RemoteId,
    pub operation_type: OperationType,
    pub args: Vec<Value>,
    /// Actual argument types, present only when an argument was rewritten
    /// into a reference. Covers every position when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_types: Option<Vec<String>>,
}

impl InvokeRequest {
    pub fn new(remote_id: RemoteId, operation_type: OperationType, args: Vec<Value>) -> Self {
        Self {
            remote_id,
            operation_type,
            args,
            arg_types: None,
        }
    }
}

/// The server's answer: declared result type plus optional value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl InvokeResponse {
    pub fn new(type_name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

// ---------------------------------------------------------------------------
// Invoker
// ---------------------------------------------------------------------------

/// Performs a single request/response exchange.
///
/// Implementations hold no per-session state; everything session-related
/// lives in the [`RemoteSession`](super::session::RemoteSession).
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RemoteError>;
}

/// [`Invoker`] posting JSON requests to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    url: String,
    client: reqwest::Client,
}

impl HttpInvoker {
    /// Create an invoker for `url` with no request timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, RemoteError> {
        Self::build(url.into(), None)
    }

    /// Create an invoker from configuration.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        Self::build(
            config.invoke_url.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    fn build(url: String, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::transport(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self { url, client })
    }

    /// Endpoint this invoker posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
        let json_body = serde_json::to_string(&request)
            .map_err(|e| RemoteError::transport(format!("Cannot encode request: {}", e)))?;

        log::debug!("POST {} {}", self.url, json_body);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(json_body.clone())
            .send()
            .await
            .map_err(|e| {
                RemoteError::transport(format!("{} from {} for {}", e, self.url, json_body))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Transport {
                message: format!("Response {} from {} for {}", status, self.url, json_body),
                status: Some(status.as_u16()),
            });
        }

        let text = response.text().await.map_err(|e| {
            RemoteError::transport(format!("{} reading body from {} for {}", e, self.url, json_body))
        })?;

        if text.trim().is_empty() {
            return Err(RemoteError::transport(format!(
                "No body from {} for {}",
                self.url, json_body
            )));
        }

        parse_response(&text).map_err(|message| {
            RemoteError::transport(format!(
                "{} when invoking {} for {}",
                message, self.url, json_body
            ))
        })
    }
}

/// Decode a response body, requiring a string `type` field.
fn parse_response(text: &str) -> Result<InvokeResponse, String> {
    let json: Value = serde_json::from_str(text).map_err(|e| format!("Unparseable body ({})", e))?;

    if !json.get("type").map_or(false, Value::is_string) {
        return Err(format!("Not an InvokeResponse but {}", json));
    }

    serde_json::from_value(json).map_err(|e| format!("Malformed InvokeResponse ({})", e))
}
