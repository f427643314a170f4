//! The "perform authorized HTTP request" capability.
//!
//! The gateway speaks in terms of [`Request`] and [`Response`]; resolving the
//! base URL, attaching credentials and enforcing timeouts are the transport's
//! job (see [`HttpTransport`](crate::HttpTransport)).

use std::fmt::{self, Display};
use std::future::Future;

use serde_json::Value;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry request, relative to the configured base URL.
///
/// The path is held as raw segments; each one is percent-encoded on its own
/// when the URL is built, so an id can never add segments or a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path segments, including any scope prefix.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new<S: Into<String>>(method: Method, segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Human-readable path for logs and error messages.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Rejects segments that URL normalization would drop or resolve:
    /// empty, `.` and `..`.
    pub fn check_segments(&self) -> Result<(), TransportError> {
        match self
            .segments
            .iter()
            .find(|s| matches!(s.as_str(), "" | "." | ".."))
        {
            Some(segment) => Err(TransportError::InvalidRequest {
                reason: format!("invalid path segment {segment:?} in {}", self.path()),
            }),
            None => Ok(()),
        }
    }
}

/// A raw registry response. The body is left unparsed so that the gateway
/// can report malformed JSON as a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs authorized HTTP requests against the registry.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request)
    }
}
