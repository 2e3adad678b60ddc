//! Explorium HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Each method makes
//! exactly one attempt and classifies any failure into a [`RemoteError`];
//! retry and backoff are the caller's business.

use std::time::Duration;

use explorium_engine::RemoteError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

// ── Constants ───────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://api.explorium.ai/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const USER_AGENT: &str = concat!("explorium/", env!("CARGO_PKG_VERSION"));

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("API key is empty")]
    MissingKey,
    #[error("failed to build HTTP client: {0}")]
    Build(String),
    #[error("unknown enrichment type '{name}' (valid: {valid})")]
    UnknownType { name: String, valid: String },
}

// ── ApiClient ───────────────────────────────────────────────────────

/// Explorium API client (blocking).
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ClientError::MissingKey);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.send(self.request(Method::GET, path), None)
    }

    /// GET with a query string, values URL-encoded.
    pub fn get_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, RemoteError> {
        self.send(self.request(Method::GET, path).query(query), None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send(self.request(Method::POST, path), Some(body))
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send(self.request(Method::PUT, path), Some(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value, RemoteError> {
        self.send(self.request(Method::DELETE, path), None)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
    }

    fn send(&self, mut req: RequestBuilder, body: Option<&Value>) -> Result<Value, RemoteError> {
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().map_err(classify_transport)?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = resp.text().unwrap_or_default();
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let mut message = extract_error(&body);
            if message.is_empty() {
                message = snippet(&text);
            }
            return Err(RemoteError::Status {
                status,
                message,
                retry_after,
            });
        }

        // Read as text first: tolerate a BOM and an empty body (DELETE).
        let text = resp.text().map_err(classify_transport)?;
        let trimmed = text.trim_start_matches('\u{feff}');
        if trimmed.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(trimmed).map_err(|e| {
            RemoteError::Protocol(format!("invalid JSON: {} (body: {})", e, snippet(trimmed)))
        })
    }
}

fn classify_transport(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        RemoteError::Connection(e.to_string())
    } else if e.is_decode() || e.is_body() {
        RemoteError::Protocol(e.to_string())
    } else {
        RemoteError::Connection(e.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}`,
/// `{"message": "..."}` and `{"error": "..." | {"message": "..."}}`.
pub(crate) fn extract_error(body: &Value) -> String {
    if let Some(detail) = body.get("detail") {
        if let Some(s) = detail.as_str() {
            return s.to_string();
        }
        if let Some(items) = detail.as_array() {
            let msgs: Vec<&str> = items.iter().filter_map(|d| d["msg"].as_str()).collect();
            if !msgs.is_empty() {
                return msgs.join("; ");
            }
        }
    }
    if let Some(s) = body["message"].as_str() {
        return s.to_string();
    }
    match &body["error"] {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new("test_key", &server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_extract_error_shapes() {
        assert_eq!(extract_error(&json!({"detail": "bad key"})), "bad key");
        assert_eq!(
            extract_error(&json!({"detail": [{"msg": "a"}, {"msg": "b"}]})),
            "a; b"
        );
        assert_eq!(extract_error(&json!({"message": "nope"})), "nope");
        assert_eq!(extract_error(&json!({"error": {"message": "inner"}})), "inner");
        assert_eq!(extract_error(&Value::Null), "");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            ApiClient::new("  ", DEFAULT_BASE_URL, DEFAULT_TIMEOUT),
            Err(ClientError::MissingKey)
        ));
    }

    #[test]
    fn test_sends_api_key_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/businesses/match")
                .header("api_key", "test_key")
                .json_body(json!({"businesses_to_match": []}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"matched_businesses": []}));
        });

        let body = client(&server)
            .post("/businesses/match", &json!({"businesses_to_match": []}))
            .unwrap();
        mock.assert();
        assert_eq!(body["matched_businesses"], json!([]));
    }

    #[test]
    fn test_get_query_encodes_params() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/businesses/autocomplete")
                .query_param("query", "star & co")
                .query_param("field", "company_name");
            then.status(200).json_body(json!({"data": ["Starbucks"]}));
        });

        let body = client(&server)
            .get_query("/businesses/autocomplete", &[("query", "star & co"), ("field", "company_name")])
            .unwrap();
        mock.assert();
        assert_eq!(body["data"][0], "Starbucks");
    }

    #[test]
    fn test_status_error_carries_message_and_retry_after() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/webhooks/p1");
            then.status(429)
                .header("retry-after", "3")
                .json_body(json!({"detail": "slow down"}));
        });

        let err = client(&server).get("/webhooks/p1").unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status { status: 429, message: "slow down".into(), retry_after: Some(3) }
        );
    }

    #[test]
    fn test_auth_error_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/webhooks/p1");
            then.status(401).body("unauthorized");
        });

        let err = client(&server).get("/webhooks/p1").unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_empty_body_is_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/webhooks/p1");
            then.status(204);
        });

        assert_eq!(client(&server).delete("/webhooks/p1").unwrap(), Value::Null);
    }

    #[test]
    fn test_bom_prefixed_json() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/webhooks/p1");
            then.status(200).body("\u{feff}{\"ok\": true}");
        });

        assert_eq!(client(&server).get("/webhooks/p1").unwrap()["ok"], true);
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/webhooks/p1");
            then.status(200).body("<html>");
        });

        let err = client(&server).get("/webhooks/p1").unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
    }

    #[test]
    fn test_connection_refused_is_retryable_class() {
        // Nothing listens on port 9 on CI runners.
        let client = ApiClient::new("k", "http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.get("/x").unwrap_err();
        assert!(matches!(err, RemoteError::Connection(_) | RemoteError::Timeout(_)));
    }
}
