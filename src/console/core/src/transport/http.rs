//! REST transport over reqwest.
//!
//! Endpoint layout:
//!
//! | Operation          | Request                                   |
//! |--------------------|-------------------------------------------|
//! | permissions        | `GET  {base}/permissions?subjectId={id}`  |
//! | list               | `GET  {base}/{kind}?{filters}`            |
//! | fetch one          | `GET  {base}/{kind}/{id}`                 |
//! | create             | `POST {base}/{kind}`                      |
//! | update             | `PUT  {base}/{kind}/{id}`                 |
//! | delete             | `DELETE {base}/{kind}/{id}`               |
//!
//! Responses may be bare payloads or wrapped as `{"success", "data",
//! "message"}`; both are accepted. Non-2xx statuses and `success: false`
//! envelopes become [`TransportError::Response`] with the parsed body.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{
    EntityId, Filters, MutationOp, MutationReceipt, PermissionSource, ResourceKind,
    ResourceTransport, TransportError,
};
use crate::error::ConsoleError;
use crate::rbac::models::{PermissionManifest, SubjectId};

/// Keys an envelope object may carry besides its payload.
const ENVELOPE_KEYS: &[&str] = &["success", "data", "message", "error", "error_code", "meta", "total"];

/// Connection settings for the REST backend.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpTransportConfig {
    /// Base URL of the API (e.g. `http://localhost:8080/api/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent as `Authorization`
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Path of the permission manifest endpoint, relative to `base_url`
    #[serde(default = "default_permissions_path")]
    pub permissions_path: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bearer_token: None,
            timeout: default_timeout(),
            permissions_path: default_permissions_path(),
        }
    }
}

impl HttpTransportConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

fn default_base_url() -> String { "http://localhost:8080/api/v1".to_string() }
fn default_timeout() -> Duration { Duration::from_secs(30) }
fn default_permissions_path() -> String { "permissions".to_string() }

/// HTTP implementation of [`PermissionSource`] and [`ResourceTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ConsoleError> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            ConsoleError::configuration(format!("invalid API base URL '{}': {}", config.base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ConsoleError::configuration(format!(
                "API base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// `{base}/{path}` or `{base}/{path}/{id}`. `path` may span several
    /// segments; the id is always exactly one, with any `/` escaped.
    fn endpoint(&self, path: &str, id: Option<&EntityId>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|p| !p.is_empty()));
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and return the parsed body of a successful response.
    async fn send(&self, builder: RequestBuilder) -> Result<Value, TransportError> {
        let resp = builder.send().await.map_err(network_error)?;
        let status = resp.status();
        let url = resp.url().clone();
        let text = resp.text().await.map_err(network_error)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(url = %url, status = status.as_u16(), "API response");

        if !status.is_success() || body.get("success") == Some(&Value::Bool(false)) {
            return Err(TransportError::Response {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Strip a `{"data": ...}` envelope, leaving bare payloads untouched.
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map)
            if map.contains_key("data") && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn network_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Network("Request timed out".to_string())
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl PermissionSource for HttpTransport {
    async fn fetch_permissions(
        &self,
        subject: Option<&SubjectId>,
    ) -> Result<PermissionManifest, TransportError> {
        let url = self.endpoint(&self.config.permissions_path, None);
        let mut builder = self.request(Method::GET, url);
        if let Some(subject) = subject {
            builder = builder.query(&[("subjectId", subject.as_str())]);
        }

        let body = unwrap_envelope(self.send(builder).await?);
        serde_json::from_value(body)
            .map_err(|e| TransportError::Decode(format!("invalid permission manifest: {}", e)))
    }
}

#[async_trait]
impl ResourceTransport for HttpTransport {
    async fn fetch_list(
        &self,
        kind: &ResourceKind,
        filters: &Filters,
    ) -> Result<Vec<Value>, TransportError> {
        let url = self.endpoint(kind.as_str(), None);
        let builder = self.request(Method::GET, url).query(filters);

        match unwrap_envelope(self.send(builder).await?) {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            other => Err(TransportError::Decode(format!(
                "expected a list of {} records, got {}",
                kind,
                json_kind(&other)
            ))),
        }
    }

    async fn fetch_one(&self, kind: &ResourceKind, id: &EntityId) -> Result<Value, TransportError> {
        let url = self.endpoint(kind.as_str(), Some(id));
        let body = self.send(self.request(Method::GET, url)).await?;
        Ok(unwrap_envelope(body))
    }

    async fn mutate(
        &self,
        kind: &ResourceKind,
        op: MutationOp,
        id: Option<&EntityId>,
        payload: Option<&Value>,
    ) -> Result<MutationReceipt, TransportError> {
        let (method, url) = match (op, id) {
            (MutationOp::Create, _) => (Method::POST, self.endpoint(kind.as_str(), None)),
            (MutationOp::Update, Some(id)) => (Method::PUT, self.endpoint(kind.as_str(), Some(id))),
            (MutationOp::Delete, Some(id)) => (Method::DELETE, self.endpoint(kind.as_str(), Some(id))),
            (op, None) => {
                return Err(TransportError::Opaque(serde_json::json!({
                    "message": format!("{} on {} requires an id", op, kind),
                })))
            }
        };

        let mut builder = self.request(method, url);
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let body = self.send(builder).await?;
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| body.get("data").and_then(|d| d.get("message")).and_then(Value::as_str))
            .map(str::to_string);

        Ok(MutationReceipt { message })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
