//! Scripted transport for tests.
//!
//! [`MockTransport`] replays queued replies in order and records every
//! request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    ConnectionFailed(String),
}

/// A transport that answers from a script.
///
/// # Examples
///
/// ```
/// use artifact_mirror_registry::mock::MockTransport;
/// use artifact_mirror_registry::HttpResponse;
///
/// let transport = MockTransport::new()
///     .with_json(200, r#"{"tags":["v1"]}"#)
///     .with_response(HttpResponse::new(404, "not found"));
/// assert_eq!(transport.request_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<HttpResponse>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that answers every request with `response`.
    #[must_use]
    pub fn always(response: HttpResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// Queues a response.
    #[must_use]
    pub fn with_response(self, response: HttpResponse) -> Self {
        self.push(Reply::Response(response));
        self
    }

    /// Queues a response with a body.
    #[must_use]
    pub fn with_json(self, status: u16, body: &str) -> Self {
        self.with_response(HttpResponse::new(status, body))
    }

    /// Queues a connection failure.
    #[must_use]
    pub fn with_connection_failure(self, message: impl Into<String>) -> Self {
        self.push(Reply::ConnectionFailed(message.into()));
        self
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Returns the URLs of every request received so far.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RegistryError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::ConnectionFailed(message)) => Err(RegistryError::ConnectionFailed {
                url: request.url.clone(),
                message,
            }),
            None => self.fallback.clone().ok_or_else(|| RegistryError::ConnectionFailed {
                url: request.url.clone(),
                message: "no scripted response left".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let transport = MockTransport::new().with_json(200, "a").with_json(500, "b");
        let request = HttpRequest::get("https://example.test/");

        assert_eq!(transport.send(&request).await.unwrap().text(), "a");
        assert_eq!(transport.send(&request).await.unwrap().status, 500);
        assert!(transport.send(&request).await.is_err());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_always_repeats_fallback() {
        let transport = MockTransport::always(HttpResponse::new(503, ""));
        let request = HttpRequest::get("https://example.test/");
        for _ in 0..3 {
            assert_eq!(transport.send(&request).await.unwrap().status, 503);
        }
    }
}
