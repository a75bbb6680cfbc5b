//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. `TastypieClient` builds
//! `HttpRequest` values and completes operations from `HttpResponse` values
//! without touching the network; firing the request is the job of whatever
//! implements `Transport`. Retries, authentication headers and timeouts all
//! live on the far side of that trait.

use async_trait::async_trait;

use crate::error::TransportFailure;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the full target, server domain and query string included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes requests built by the client.
///
/// Implementations return `Ok` for every response they receive, whatever
/// the status; status interpretation belongs to the client. `Err` is for
/// round-trips that produced no response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 201,
            headers: vec![("Location".to_string(), "/api/v1/book/3/".to_string())],
            body: String::new(),
        };
        assert_eq!(response.header("location"), Some("/api/v1/book/3/"));
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn only_2xx_is_success() {
        let mut response = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 301;
        assert!(!response.is_success());
        response.status = 199;
        assert!(!response.is_success());
    }
}
