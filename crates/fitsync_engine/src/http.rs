//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so any library
//! (reqwest, hyper, a platform fetch bridge) can carry the calls.
//! [`HttpTransport`] owns everything above raw bytes: URL building, the
//! `Authorization` header, JSON encoding and status classification.

use crate::auth::SessionToken;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::ApiTransport;
use fitsync_protocol::{classify_status, ApiRequest, HttpMethod, StatusClass};
use parking_lot::RwLock;
use std::future::Future;

/// A raw HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL, query included.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Value of the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// `send` fails only when no response was received; every status, success
/// or not, is returned as an [`HttpResponse`].
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// HTTP-based API transport with JSON bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the API, e.g. `https://api.example.com/api`.
    base_url: String,
    /// Scheme placed before the token.
    auth_scheme: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_scheme: "Token".to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Creates a transport for the API and auth scheme of `config`.
    pub fn from_config(config: &SyncConfig, client: C) -> Self {
        let mut transport = Self::new(config.api_url.clone(), client);
        transport.auth_scheme = config.auth_scheme.clone();
        transport
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    /// Builds the raw request for `request`.
    pub fn build(
        &self,
        request: &ApiRequest,
        auth: Option<&SessionToken>,
    ) -> SyncResult<HttpRequest> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = auth {
            headers.push((
                "Authorization".to_string(),
                format!("{} {}", self.auth_scheme, token.expose()),
            ));
        }
        let body = match &request.body {
            Some(json) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_vec(json)?)
            }
            None => None,
        };
        Ok(HttpRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, request.path_and_query()),
            headers,
            body,
        })
    }

    fn interpret(&self, response: HttpResponse) -> SyncResult<serde_json::Value> {
        match classify_status(response.status) {
            StatusClass::Success => {
                self.clear_error();
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(serde_json::Value::Null);
                }
                Ok(serde_json::from_slice(&response.body)?)
            }
            _ => {
                let message = error_message(&response.body);
                self.set_error(&message);
                Err(SyncError::from_status(response.status, message))
            }
        }
    }
}

impl<C: HttpClient> ApiTransport for HttpTransport<C> {
    async fn execute(
        &self,
        request: &ApiRequest,
        auth: Option<&SessionToken>,
    ) -> SyncResult<serde_json::Value> {
        let raw = self.build(request, auth)?;
        let response = self.client.send(raw).await.map_err(|e| {
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;
        self.interpret(response)
    }
}

/// Pulls a readable message out of an error body.
///
/// Django REST style bodies carry it in `detail`; anything else is shown
/// verbatim.
fn error_message(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(detail) = json.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
        return json.to_string();
    }
    String::from_utf8_lossy(body).into_owned()
}
