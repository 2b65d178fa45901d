//! HTTP transport boundary.
//!
//! All network I/O goes through [`HttpTransport`], so the paginated client can
//! be exercised in tests against [`MockTransport`] without sockets.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Header pairs; lookups are case-insensitive.
pub type HttpHeaders = Vec<(String, String)>;

/// A GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HttpHeaders,
}

#[cfg(test)]
impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

/// A response with its full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[cfg(test)]
    #[error("no mock response registered for GET {url}")]
    NoMockResponse { url: String },
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[cfg(test)]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Production transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bhunter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.client.get(&request.url);
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Transport(format!("request timed out: {}", request.url))
            } else if e.is_connect() {
                HttpError::Transport(format!("cannot connect: {}", request.url))
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory transport keyed by URL.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<String, VecDeque<Result<HttpResponse, String>>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a URL; repeated registrations are served FIFO.
    pub fn push_response(&self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");
        inner
            .routes
            .entry(url.into())
            .or_default()
            .push_back(Ok(HttpResponse {
                status,
                body: body.into(),
            }));
    }

    /// Queue a transport failure for a URL.
    pub fn push_failure(&self, url: impl Into<String>, message: &str) {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");
        inner
            .routes
            .entry(url.into())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self.inner.lock().expect("mock transport lock poisoned");
        inner.requests.clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self.inner.lock().expect("mock transport lock poisoned");

        let url = request.url.clone();
        inner.requests.push(request);

        match inner.routes.get_mut(&url).and_then(|q| q.pop_front()) {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(message)) => Err(HttpError::Transport(message)),
            None => Err(HttpError::NoMockResponse { url }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive() {
        let headers: HttpHeaders = vec![("Accept".to_string(), "application/json".to_string())];
        assert_eq!(header_get(&headers, "accept"), Some("application/json"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn success_range() {
        let ok = HttpResponse {
            status: 204,
            body: Vec::new(),
        };
        let not_ok = HttpResponse {
            status: 302,
            body: Vec::new(),
        };
        assert!(ok.is_success());
        assert!(!not_ok.is_success());
    }

    #[tokio::test]
    async fn mock_transport_serves_fifo_and_records_requests() {
        let transport = MockTransport::new();
        let url = "https://example.com/api";
        transport.push_response(url, 200, "first");
        transport.push_response(url, 500, "second");

        let req = HttpRequest {
            url: url.to_string(),
            headers: Vec::new(),
        };
        let first = transport.get(req.clone()).await.unwrap();
        let second = transport.get(req.clone()).await.unwrap();

        assert_eq!(first.body, b"first".to_vec());
        assert_eq!(second.status, 500);
        assert_eq!(transport.requests(), vec![req.clone(), req]);
    }

    #[tokio::test]
    async fn mock_transport_errors_without_route() {
        let transport = MockTransport::new();
        let err = transport
            .get(HttpRequest {
                url: "https://example.com/missing".to_string(),
                headers: Vec::new(),
            })
            .await
            .expect_err("missing mock should error");

        assert!(matches!(err, HttpError::NoMockResponse { .. }));
    }
}
