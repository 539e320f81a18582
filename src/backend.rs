//! HTTP client for the EUK backend. Every call is queued on the governor.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::Method;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::GatewayError;
use crate::governor::RequestGovernor;
use crate::metrics::BACKEND_LATENCY;

// What the backend answered, body already decoded
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub body: Value,
}

impl BackendResponse {
    async fn read(res: reqwest::Response) -> Result<Self, GatewayError> {
        let status = res.status();
        let retry_after = res
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string());
        let bytes = res.bytes().await?;

        Ok(Self {
            status,
            retry_after,
            body: decode_body(&bytes),
        })
    }
}

impl IntoResponse for BackendResponse {
    fn into_response(self) -> Response {
        if self.body.is_null() {
            return self.status.into_response();
        }
        (self.status, Json(self.body)).into_response()
    }
}

// Empty body -> null, non-JSON text -> {"message": text}
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| json!({ "message": String::from_utf8_lossy(bytes).trim() }))
}

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    governor: RequestGovernor,
}

impl BackendClient {
    // Accepts "host:port" or a full url
    pub fn new(base_url: &str, timeout: Duration, governor: RequestGovernor) -> Self {
        let base_url = base_url.trim().trim_end_matches('/');
        let base_url = if base_url.starts_with("http") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        };

        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
            governor,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn governor(&self) -> &RequestGovernor {
        &self.governor
    }

    pub async fn get(
        &self,
        path: &str,
        query: Option<&str>,
        auth: Option<&str>,
    ) -> Result<BackendResponse, GatewayError> {
        self.send(Method::GET, path, query, None, auth).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Value,
        auth: Option<&str>,
    ) -> Result<BackendResponse, GatewayError> {
        self.send(Method::POST, path, None, Some(body), auth).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Value,
        auth: Option<&str>,
    ) -> Result<BackendResponse, GatewayError> {
        self.send(Method::PUT, path, None, Some(body), auth).await
    }

    pub async fn delete(&self, path: &str, auth: Option<&str>) -> Result<BackendResponse, GatewayError> {
        self.send(Method::DELETE, path, None, None, auth).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<Value>,
        auth: Option<&str>,
    ) -> Result<BackendResponse, GatewayError> {
        let mut url = format!("{}{}", self.base_url, path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        debug!(%method, %url, "Queueing backend call");

        let mut request = self.client.request(method, url).timeout(self.timeout);
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        self.governor
            .execute(move || async move {
                let start = Instant::now();
                let sent = request.send().await;
                BACKEND_LATENCY.observe(start.elapsed().as_secs_f64());
                match sent {
                    Ok(res) => BackendResponse::read(res).await,
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }
}

// Authorization header of the inbound request, forwarded verbatim
pub fn forwarded_auth(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::GovernorConfig;

    fn client(url: &str) -> BackendClient {
        BackendClient::new(
            url,
            Duration::from_millis(200),
            RequestGovernor::new(GovernorConfig::default()),
        )
    }

    #[test]
    fn test_base_url_normalised() {
        assert_eq!(client("localhost:8080").base_url(), "http://localhost:8080");
        assert_eq!(client("https://euk.example/ ").base_url(), "https://euk.example");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(br#"{"id":1}"#), json!({ "id": 1 }));
        assert_eq!(decode_body(b"Bad Gateway"), json!({ "message": "Bad Gateway" }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // nothing listens on the discard port
        let client = client("http://127.0.0.1:9");

        let err = client.get("/api/ugrozena-lica", None, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::BackendUnavailable(_)), "got {err:?}");
    }
}
