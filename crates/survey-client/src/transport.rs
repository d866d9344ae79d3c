use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;

const API_KEY_HEADER: &str = "X-API-Key";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSuccess {
    pub status: u16,
    pub data: Value,
}

pub type TransportResult = Result<ApiSuccess, TransportError>;

/// Executes a single request. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest, cancel: &CancellationToken) -> TransportResult;
}

/// Partial update applied by [`HttpTransport::update_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
struct Settings {
    base_url: String,
    api_key: Option<String>,
    token: Option<String>,
    timeout: Duration,
}

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    settings: RwLock<Settings>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(http, config)
    }

    /// Uses a caller-built client, e.g. one with custom proxy or TLS settings.
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            settings: RwLock::new(Settings {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                token: config.token.clone(),
                timeout: config.timeout(),
            }),
        }
    }

    pub fn update_config(&self, update: ConfigUpdate) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(base_url) = update.base_url {
            settings.base_url = base_url;
        }
        if let Some(api_key) = update.api_key {
            settings.api_key = Some(api_key);
        }
        if let Some(token) = update.token {
            settings.token = Some(token);
        }
        if let Some(timeout) = update.timeout {
            settings.timeout = timeout;
        }
    }

    pub fn base_url(&self) -> String {
        self.snapshot().base_url
    }

    fn snapshot(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn execute(&self, request: ApiRequest) -> TransportResult {
        let settings = self.snapshot();
        let url = endpoint_url(&settings.base_url, &request.endpoint);

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), &url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .timeout(settings.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(api_key) = &settings.api_key {
            builder = builder.header(API_KEY_HEADER, api_key);
        }
        if let Some(token) = &settings.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = ?request.method, %url, "sending request");
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        debug!(status, "received response");

        if !(200..300).contains(&status) {
            let message = if text.trim().is_empty() {
                format!("HTTP error! status: {status}")
            } else {
                text
            };
            return Err(TransportError::Http { status, message });
        }

        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|err| TransportError::Decode {
                status,
                message: err.to_string(),
            })?
        };
        Ok(ApiSuccess { status, data })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest, cancel: &CancellationToken) -> TransportResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.execute(request) => result,
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_single_slash() {
        assert_eq!(
            endpoint_url("http://host/api/v2/", "/surveys"),
            "http://host/api/v2/surveys"
        );
        assert_eq!(endpoint_url("http://host", "surveys"), "http://host/surveys");
    }

    #[test]
    fn update_config_merges_fields() {
        let transport = HttpTransport::new(&ClientConfig::default());
        transport.update_config(ConfigUpdate {
            base_url: Some("http://localhost:1".into()),
            ..ConfigUpdate::default()
        });
        let settings = transport.snapshot();
        assert_eq!(settings.base_url, "http://localhost:1");
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn request_builders_set_method_and_query() {
        let request = ApiRequest::get("/surveys").with_query("org_id", "4145");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query, vec![("org_id".into(), "4145".into())]);
        assert!(ApiRequest::delete("/x").body.is_none());
        assert!(ApiRequest::put("/x", Value::Null).body.is_some());
    }
}
