//! HTTP transport backed by `reqwest`

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use wrench_config::ServerConfig;
use wrench_sync::{Method, Request, Transport, TransportError};

/// Longest server message kept on a failed request
const MAX_ERROR_BODY: usize = 200;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Queued URLs are server-relative unless they carry their own scheme
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
        let url = self.url_for(&request.url);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(http_method(request.method), &url);
        if request.method != Method::Get && !request.data.is_null() {
            builder = builder.json(&request.data);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.chars().take(MAX_ERROR_BODY).collect()
            };
            return Err(TransportError::status(status.as_u16(), message));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(&ServerConfig {
            base_url: base_url.to_string(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_relative_urls_join_base() {
        let http = transport("https://cmms.example.com/");
        assert_eq!(http.url_for("/api/assets/1"), "https://cmms.example.com/api/assets/1");
        assert_eq!(http.url_for("http://other.host/x"), "http://other.host/x");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let http = transport("http://127.0.0.1:9");
        let err = http
            .execute(&Request::get("/api/assets"))
            .await
            .unwrap_err();
        assert_eq!(err.status, None);
        assert!(!http.is_conflict(&err));
    }
}
