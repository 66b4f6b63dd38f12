//! HTTP client for the Migration Factory record endpoints.
//!
//! Records live under `/user/{schema}`: `GET` lists them, `POST` creates a
//! batch, and `PUT /user/{schema}/{id}` updates one.

use async_trait::async_trait;
use mf_core::live::{EntityCollection, LiveSnapshot};
use mf_core::types::Record;
use mf_pipeline::service::{
    CreateResponse, ErrorItem, RecordService, ServiceError, UpdateResponse,
};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde_json::Value;

use crate::config::ClientConfig;

/// Record API client for one Migration Factory deployment.
pub struct HttpRecordService {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

/// Errors from the record API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Record API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The API answered 2xx with a body of the wrong shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Request(e) if e.is_decode() => ServiceError::Malformed(e.to_string()),
            ApiError::Request(e) => ServiceError::Transport(e.to_string()),
            ApiError::ApiError { status, body } => ServiceError::Rejected {
                status,
                body: serde_json::from_str(&body).unwrap_or(Value::String(body)),
            },
            ApiError::Decode(message) => ServiceError::Malformed(message),
        }
    }
}

impl HttpRecordService {
    /// * `api_url` - Base URL including the stage, e.g. `https://host/prod`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            token: None,
        }
    }

    /// Build a client with the configured timeout and token.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let service = Self::with_client(client, config.api_url.clone());
        Ok(match &config.api_token {
            Some(token) => service.with_token(token.clone()),
            None => service,
        })
    }

    /// Send `token` as the `Authorization` header on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// All records of `schema_name`.
    pub async fn list_records(&self, schema_name: &str) -> Result<Vec<Record>, ApiError> {
        let response = self
            .request(Method::GET, &format!("/user/{schema_name}"))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Create a batch of records.
    ///
    /// The `errors` member of the response is either a list of per-item
    /// errors or an object keyed by error kind; both are normalized to
    /// [`ErrorItem`]s.
    pub async fn create_records(
        &self,
        schema_name: &str,
        records: &[Record],
    ) -> Result<CreateResponse, ApiError> {
        let response = self
            .request(Method::POST, &format!("/user/{schema_name}"))
            .json(records)
            .send()
            .await?;
        let body: Value = Self::parse_response(response).await?;
        parse_create_response(body)
    }

    /// Update the record with backend id `id`.
    pub async fn update_record(
        &self,
        schema_name: &str,
        id: &str,
        record: &Record,
    ) -> Result<UpdateResponse, ApiError> {
        let response = self
            .request(Method::PUT, &format!("/user/{schema_name}/{id}"))
            .json(record)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(UpdateResponse::default());
        }
        let body: Value = serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(UpdateResponse {
            errors: body.get("errors").map(normalize_errors).unwrap_or_default(),
        })
    }

    /// Load the collections of `schema_names`. A schema that fails to load
    /// is recorded as failed rather than aborting the whole snapshot.
    pub async fn fetch_snapshot(&self, schema_names: &[String]) -> LiveSnapshot {
        let mut snapshot = LiveSnapshot::new();
        for name in schema_names {
            let collection = match self.list_records(name).await {
                Ok(records) => {
                    tracing::debug!(schema = %name, count = records.len(), "Loaded live records");
                    EntityCollection::loaded(records)
                }
                Err(e) => {
                    tracing::warn!(schema = %name, error = %e, "Failed to load live records");
                    EntityCollection::failed(e.to_string())
                }
            };
            snapshot.insert(name.clone(), collection);
        }
        snapshot
    }

    // ---- private helpers ----

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_url, path));
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, token),
            None => builder,
        }
    }

    /// Return the response unchanged on a success status, otherwise an
    /// [`ApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn create(&self, schema_name: &str, records: &[Record]) -> Result<CreateResponse, ServiceError> {
        tracing::debug!(schema = %schema_name, count = records.len(), "POST records");
        Ok(self.create_records(schema_name, records).await?)
    }

    async fn update(
        &self,
        schema_name: &str,
        id: &str,
        record: &Record,
    ) -> Result<UpdateResponse, ServiceError> {
        tracing::debug!(schema = %schema_name, id, "PUT record");
        Ok(self.update_record(schema_name, id, record).await?)
    }
}

fn parse_create_response(body: Value) -> Result<CreateResponse, ApiError> {
    match body {
        Value::Object(mut map) => {
            let new_items = match map.remove("newItems") {
                None | Some(Value::Null) => Vec::new(),
                Some(items) => serde_json::from_value(items)
                    .map_err(|e| ApiError::Decode(format!("newItems: {e}")))?,
            };
            let errors = map.get("errors").map(normalize_errors).unwrap_or_default();
            Ok(CreateResponse { new_items, errors })
        }
        other => Err(ApiError::Decode(format!(
            "expected an object with newItems, got {other}"
        ))),
    }
}

fn normalize_errors(errors: &Value) -> Vec<ErrorItem> {
    match errors {
        Value::Array(items) => items.iter().map(error_item).collect(),
        Value::Object(kinds) => kinds
            .iter()
            .filter_map(|(kind, detail)| {
                let details = strings(detail);
                (!details.is_empty()).then(|| ErrorItem {
                    cause: None,
                    errors: details.into_iter().map(|d| format!("{kind}: {d}")).collect(),
                    item: None,
                })
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![error_item(other)],
    }
}

fn error_item(value: &Value) -> ErrorItem {
    match value {
        Value::String(s) => ErrorItem {
            cause: Some(s.clone()),
            ..ErrorItem::default()
        },
        Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_else(|_| ErrorItem {
            cause: Some(value.to_string()),
            ..ErrorItem::default()
        }),
        other => ErrorItem {
            cause: Some(other.to_string()),
            ..ErrorItem::default()
        },
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(strings).collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}
