//! Transport client, the single point of entry for all remote operations.
//!
//! ARCHITECTURAL RULE: the form engine never constructs URLs. It names an
//! operation id plus a parameters map, and the transport resolves the rest.
//! `HttpTransport` is the production implementation; tests substitute their
//! own `Transport` doubles.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TransportConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("operation `{0}` is not registered")]
    UnknownOperation(String),

    #[error("operation `{0}` requires an id parameter")]
    MissingId(String),

    #[error("remote returned status {status}")]
    Status { status: u16, body: Value },

    #[error("operation `{operation}` failed after {retries} attempts")]
    Exhausted { operation: String, retries: u32 },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured validation failures carry a per-field error payload.
    pub fn is_validation(&self) -> bool {
        matches!(self.status(), Some(400) | Some(422))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Parameters of one remote operation: an optional entity id plus a data
/// payload. The engine builds these; it never sees a URL.
#[derive(Debug, Clone, Default)]
pub struct OperationParams {
    pub id: Option<Value>,
    pub data: Value,
}

impl OperationParams {
    pub fn data(data: Value) -> Self {
        OperationParams { id: None, data }
    }

    pub fn with_id(id: Value, data: Value) -> Self {
        OperationParams { id: Some(id), data }
    }
}

/// A locally attached file pending upload.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation_id: String,
    pub parameters: OperationParams,
    pub file: Option<FilePayload>,
}

impl OperationRequest {
    pub fn new(operation_id: impl Into<String>, parameters: OperationParams) -> Self {
        OperationRequest {
            operation_id: operation_id.into(),
            parameters,
            file: None,
        }
    }

    pub fn with_file(mut self, file: FilePayload) -> Self {
        self.file = Some(file);
        self
    }
}

#[derive(Debug, Clone)]
pub struct OperationResponse {
    pub obj: Value,
    pub headers: HashMap<String, String>,
}

/// Executes named remote operations. Implemented by `HttpTransport` in
/// production and by in-memory doubles in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OperationRequest)
        -> Result<OperationResponse, TransportError>;
}

#[derive(Debug, Clone)]
struct OperationRoute {
    method: Method,
    path: String,
}

/// HTTP implementation of [`Transport`] over an operation registry.
/// Retries on 429 and 5xx with exponential backoff; non-2xx responses keep
/// their parsed body so the error taxonomy mapper can classify them.
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
    routes: HashMap<String, OperationRoute>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        HttpTransport {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
            config,
            routes: HashMap::new(),
        }
    }

    /// Registers one operation id as `method` + path template. Templates may
    /// carry an `{id}` placeholder, e.g. `/candidates/{id}`.
    pub fn route(mut self, operation_id: &str, method: Method, path: &str) -> Self {
        self.routes.insert(
            operation_id.to_string(),
            OperationRoute {
                method,
                path: path.to_string(),
            },
        );
        self
    }

    fn url_for(
        &self,
        operation_id: &str,
        route: &OperationRoute,
        params: &OperationParams,
    ) -> Result<String, TransportError> {
        let base = self.config.base_url.trim_end_matches('/');
        let path = if route.path.contains("{id}") {
            let id = params
                .id
                .as_ref()
                .ok_or_else(|| TransportError::MissingId(operation_id.to_string()))?;
            route.path.replace("{id}", &id_to_string(id))
        } else {
            route.path.clone()
        };
        Ok(format!("{base}{path}"))
    }
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: OperationRequest,
    ) -> Result<OperationResponse, TransportError> {
        let route = self
            .routes
            .get(&request.operation_id)
            .ok_or_else(|| TransportError::UnknownOperation(request.operation_id.clone()))?;
        let url = self.url_for(&request.operation_id, route, &request.parameters)?;

        let mut last_error: Option<TransportError> = None;

        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    operation = %request.operation_id,
                    "attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut builder = self.client.request(route.method.clone(), &url);
            if let Some(token) = &self.config.auth_token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }

            builder = match &request.file {
                Some(file) => {
                    let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                        .file_name(file.name.clone())
                        .mime_str(&file.content_type)?;
                    let mut form = reqwest::multipart::Form::new().part("file", part);
                    if !request.parameters.data.is_null() {
                        form = form.text("data", request.parameters.data.to_string());
                    }
                    builder.multipart(form)
                }
                None if route.method == Method::GET => builder,
                None => builder.json(&request.parameters.data),
            };

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(TransportError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = parse_body(response.text().await.unwrap_or_default());
                warn!(operation = %request.operation_id, "remote returned {status}");
                last_error = Some(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            if !status.is_success() {
                let body = parse_body(response.text().await.unwrap_or_default());
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.to_string(), v.to_string()))
                })
                .collect();
            let obj = parse_body(response.text().await.unwrap_or_default());

            debug!(operation = %request.operation_id, "operation succeeded");

            return Ok(OperationResponse { obj, headers });
        }

        Err(last_error.unwrap_or(TransportError::Exhausted {
            operation: request.operation_id.clone(),
            retries: self.config.max_retries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::new(TransportConfig::new("https://api.example.test/"))
            .route("candidateRead", Method::GET, "/candidates/{id}")
            .route("candidateSave", Method::POST, "/candidates")
    }

    #[test]
    fn test_url_substitutes_string_id() {
        let transport = transport();
        let route = transport.routes.get("candidateRead").unwrap();
        let params = OperationParams::with_id(json!("abc-1"), Value::Null);
        let url = transport.url_for("candidateRead", route, &params).unwrap();
        assert_eq!(url, "https://api.example.test/candidates/abc-1");
    }

    #[test]
    fn test_url_substitutes_numeric_id() {
        let transport = transport();
        let route = transport.routes.get("candidateRead").unwrap();
        let params = OperationParams::with_id(json!(42), Value::Null);
        let url = transport.url_for("candidateRead", route, &params).unwrap();
        assert_eq!(url, "https://api.example.test/candidates/42");
    }

    #[test]
    fn test_url_without_placeholder_ignores_id() {
        let transport = transport();
        let route = transport.routes.get("candidateSave").unwrap();
        let url = transport
            .url_for("candidateSave", route, &OperationParams::default())
            .unwrap();
        assert_eq!(url, "https://api.example.test/candidates");
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let transport = transport();
        let route = transport.routes.get("candidateRead").unwrap();
        let err = transport
            .url_for("candidateRead", route, &OperationParams::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingId(_)));
    }

    #[tokio::test]
    async fn test_unknown_operation_fails_without_network() {
        let transport = transport();
        let err = transport
            .execute(OperationRequest::new("nope", OperationParams::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownOperation(_)));
    }

    #[test]
    fn test_parse_body_degrades_to_string() {
        assert_eq!(parse_body(String::new()), Value::Null);
        assert_eq!(parse_body("{\"a\":1}".to_string()), json!({"a": 1}));
        assert_eq!(
            parse_body("plain text".to_string()),
            Value::String("plain text".to_string())
        );
    }

    #[test]
    fn test_error_classification() {
        let validation = TransportError::Status {
            status: 400,
            body: json!({"firstName": ["required"]}),
        };
        assert!(validation.is_validation());
        assert!(!validation.is_not_found());

        let missing = TransportError::Status {
            status: 404,
            body: Value::Null,
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_validation());
    }
}
