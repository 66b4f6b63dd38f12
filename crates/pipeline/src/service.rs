//! The backend record service seam.

use std::sync::Arc;

use async_trait::async_trait;
use mf_core::types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when a failure carries no structured cause.
pub const UNKNOWN_ERROR: &str = "unknown error occurred";

/// One per-record error returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// The record the error refers to, when the backend echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
}

impl ErrorItem {
    pub fn message(&self) -> String {
        if let Some(cause) = self.cause.as_deref().filter(|c| !c.is_empty()) {
            return cause.to_string();
        }
        if !self.errors.is_empty() {
            return self.errors.join("; ");
        }
        UNKNOWN_ERROR.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "newItems", default)]
    pub new_items: Vec<Record>,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

/// Failure of a whole backend call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The backend answered with a non-success status.
    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: Value },

    /// The request never got a response.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend answered with a body that could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// The message recorded against each affected record.
    pub fn commit_message(&self) -> String {
        match self {
            Self::Rejected { body, .. } => rejection_cause(body).unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            Self::Transport(_) => UNKNOWN_ERROR.to_string(),
            Self::Malformed(message) => format!("Internal API error: {message}"),
        }
    }
}

/// `cause` or joined `errors` from a structured error body.
fn rejection_cause(body: &Value) -> Option<String> {
    if let Some(cause) = body.get("cause").and_then(Value::as_str) {
        return Some(cause.to_string());
    }
    let errors: Vec<String> = body
        .get("errors")?
        .as_array()?
        .iter()
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Persists records. Implementations own timeouts and retries.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Create all `records` of `schema_name` in one call.
    async fn create(&self, schema_name: &str, records: &[Record]) -> Result<CreateResponse, ServiceError>;

    /// Update the record with backend id `id`.
    async fn update(
        &self,
        schema_name: &str,
        id: &str,
        record: &Record,
    ) -> Result<UpdateResponse, ServiceError>;
}

#[async_trait]
impl<T: RecordService + ?Sized> RecordService for Arc<T> {
    async fn create(&self, schema_name: &str, records: &[Record]) -> Result<CreateResponse, ServiceError> {
        (**self).create(schema_name, records).await
    }

    async fn update(
        &self,
        schema_name: &str,
        id: &str,
        record: &Record,
    ) -> Result<UpdateResponse, ServiceError> {
        (**self).update(schema_name, id, record).await
    }
}
