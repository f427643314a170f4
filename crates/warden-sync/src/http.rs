//! `reqwest`-backed [`Transport`].
//!
//! One `reqwest::Client` carries the bearer credential and JSON content type
//! as default headers and enforces the per-request timeout. Retries are not
//! built in; a failed submit is retried by the caller.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::transport::{Method, Request, Response, Transport};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Registry API root, e.g. `http://127.0.0.1:4000/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP transport talking to a live registry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::InvalidRequest`] if the base URL does not
    /// parse or the token holds characters not allowed in a header.
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| TransportError::InvalidRequest {
            reason: format!("invalid registry URL {base_url:?}: {e}"),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                TransportError::InvalidRequest {
                    reason: "invalid characters in bearer token".into(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &Request) -> Result<Url, TransportError> {
        request.check_segments()?;

        let mut url = Url::parse(&self.base_url).map_err(|e| TransportError::InvalidRequest {
            reason: format!("invalid registry URL {:?}: {e}", self.base_url),
        })?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidRequest {
                reason: format!("registry URL {:?} cannot carry a path", self.base_url),
            })?
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request)?;
        let endpoint = request.path();

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, endpoint = %endpoint, "sending registry request");

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    endpoint: endpoint.clone(),
                }
            } else {
                TransportError::Unreachable {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    endpoint: endpoint.clone(),
                }
            } else {
                TransportError::Unreachable {
                    endpoint: endpoint.clone(),
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:4000/api/")).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:4000/api");
    }

    #[test]
    fn query_pairs_are_encoded() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:4000/api")).unwrap();
        let request = Request::new(Method::Get, ["policy-set"]).with_query(vec![(
            "access_subject".into(),
            "did:ishare:EU.NL NTRNL".into(),
        )]);

        let url = transport.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4000/api/policy-set?access_subject=did%3Aishare%3AEU.NL+NTRNL"
        );
    }

    #[test]
    fn ids_stay_inside_one_segment() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:4000/api")).unwrap();

        let query_like = Request::new(Method::Delete, ["policy-set", "x?policy_issuer=y"]);
        let url = transport.url_for(&query_like).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4000/api/policy-set/x%3Fpolicy_issuer=y"
        );
        assert!(url.query().is_none());

        let nested = Request::new(Method::Get, ["policy-set", "a/../../admin", "policy", "p#1"]);
        assert_eq!(
            transport.url_for(&nested).unwrap().path(),
            "/api/policy-set/a%2F..%2F..%2Fadmin/policy/p%231"
        );
    }

    #[test]
    fn parent_segment_cannot_escape_scope() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:4000/api")).unwrap();
        let request = Request::new(Method::Delete, ["policy-set", "..", "admin", "policy-set", "x"]);

        let err = transport.url_for(&request).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest { .. }));
    }

    #[test]
    fn bare_host_base_gets_single_slash() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:4000")).unwrap();
        let request = Request::new(Method::Get, ["policy-set", "s1"]);
        assert_eq!(
            transport.url_for(&request).unwrap().as_str(),
            "http://localhost:4000/policy-set/s1"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let err = HttpTransport::new(HttpConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest { .. }));
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = HttpTransport::new(HttpConfig::new("http://localhost").with_token("a\nb"))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest { .. }));
    }
}
