//! HTTP transaction layer.
//!
//! The adapter talks to the remote service only through [`Transport`], so
//! hosts can route requests however they like and tests can substitute a
//! recording mock. [`HttpTransport`] is the reqwest-backed implementation.

use std::future::Future;

use reqwest::{Client, Method};

use crate::config::{DriveConfig, TransportMode};
use crate::error::{DriveError, Result};

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    /// Query parameters, appended URL-encoded.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter, if set.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a header, compared case-insensitively.
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx reply into `DriveError::Remote`.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DriveError::Remote {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }
}

/// Verb-level HTTP access used by the drive client.
///
/// Implementations report network failures as `DriveError::Transport`;
/// non-2xx statuses are returned as ordinary responses.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;

    fn get(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        self.send(HttpRequest {
            method: Method::GET,
            ..request
        })
    }

    fn post(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        self.send(HttpRequest {
            method: Method::POST,
            ..request
        })
    }

    fn patch(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        self.send(HttpRequest {
            method: Method::PATCH,
            ..request
        })
    }
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client for the given transport mode.
    pub fn new(config: &DriveConfig, mode: &TransportMode) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(10));

        if let TransportMode::Proxy(url) = mode {
            builder = builder.proxy(reqwest::Proxy::all(url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        log::debug!("{} {}", request.method, request.uri);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.uri)
            .query(&request.params);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = HttpRequest::new(Method::GET, "https://example.test/files")
            .param("q", "'a' in parents")
            .header("Authorization", "Bearer t");
        assert_eq!(req.param_value("q"), Some("'a' in parents"));
        assert_eq!(req.header_value("authorization"), Some("Bearer t"));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_error_for_status() {
        assert!(HttpResponse::ok("{}").error_for_status().is_ok());

        let err = HttpResponse {
            status: 500,
            body: b"backend".to_vec(),
        }
        .error_for_status()
        .unwrap_err();
        match err {
            DriveError::Remote { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "backend");
            }
            other => panic!("Expected Remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_http_transport_builds_with_proxy() {
        let config = DriveConfig::default();
        let mode = TransportMode::Proxy("http://127.0.0.1:3128".into());
        assert!(HttpTransport::new(&config, &mode).is_ok());
    }
}
