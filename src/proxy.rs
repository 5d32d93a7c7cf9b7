//! Random proxy selection from a public proxy list
//!
//! One GET per call, no retry, no caching, no health checks. Callers decide
//! what to do with a failure; the download workflow simply goes direct.

use crate::config::PROXY_FETCH_TIMEOUT_SECS;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::{Client as HttpClient, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a proxy list lookup
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Request failed before a response arrived (including timeout)
    #[error("proxy list request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Endpoint answered with something other than 200
    #[error("proxy list returned HTTP {0}")]
    Status(StatusCode),
    /// Response contained no usable entries
    #[error("proxy list is empty")]
    EmptyList,
}

/// A proxy endpoint such as `http://1.2.3.4:8080`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord(String);

impl ProxyRecord {
    /// Wrap a list entry, adding `http://` when it has no scheme
    #[must_use]
    pub fn new(entry: &str) -> Self {
        let entry = entry.trim();
        if entry.contains("://") {
            Self(entry.to_string())
        } else {
            Self(format!("http://{entry}"))
        }
    }

    /// Endpoint as passed to the extractor
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a newline-separated proxy list, skipping blank lines and comments
#[must_use]
pub fn parse_proxy_list(body: &str) -> Vec<ProxyRecord> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ProxyRecord::new)
        .collect()
}

/// Pick one entry uniformly at random
#[must_use]
pub fn choose_proxy(records: &[ProxyRecord]) -> Option<ProxyRecord> {
    records.choose(&mut rand::thread_rng()).cloned()
}

/// Source of a single proxy for one download
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch the list and return one random entry
    async fn fetch_proxy(&self) -> Result<ProxyRecord, ProxyError>;
}

/// [`ProxySource`] backed by a plain-text HTTP endpoint
pub struct ProxySupplier {
    http: HttpClient,
    endpoint: String,
}

impl ProxySupplier {
    /// Create a supplier for `endpoint` with the standard 10 second timeout
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(PROXY_FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint queried by this supplier
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProxySource for ProxySupplier {
    async fn fetch_proxy(&self) -> Result<ProxyRecord, ProxyError> {
        let response = self.http.get(&self.endpoint).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProxyError::Status(status));
        }

        let body = response.text().await?;
        let records = parse_proxy_list(&body);
        let proxy = choose_proxy(&records).ok_or(ProxyError::EmptyList)?;

        debug!(candidates = records.len(), proxy = %proxy, "Selected proxy");
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/proxies.txt")
    }

    #[test]
    fn test_parse_proxy_list() {
        let body = "http://1.1.1.1:80\n\n  socks5://2.2.2.2:1080  \n# comment\n3.3.3.3:3128\r\n";
        let records = parse_proxy_list(body);
        assert_eq!(
            records,
            vec![
                ProxyRecord::new("http://1.1.1.1:80"),
                ProxyRecord::new("socks5://2.2.2.2:1080"),
                ProxyRecord::new("http://3.3.3.3:3128"),
            ]
        );
        assert_eq!(records[2].as_str(), "http://3.3.3.3:3128");
    }

    #[test]
    fn test_choose_proxy_empty() {
        assert!(choose_proxy(&[]).is_none());
    }

    #[test]
    fn test_choose_proxy_covers_all_entries() {
        let records = parse_proxy_list("http://a:1\nhttp://b:2\nhttp://c:3");
        let seen: HashSet<String> = (0..500)
            .filter_map(|_| choose_proxy(&records))
            .map(|p| p.to_string())
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_proxy_success() {
        let url = serve_once("200 OK", "http://10.0.0.1:8080\nhttp://10.0.0.2:8080\n").await;
        let proxy = ProxySupplier::new(url)
            .fetch_proxy()
            .await
            .expect("proxy expected");
        assert!(proxy.as_str().starts_with("http://10.0.0."));
    }

    #[tokio::test]
    async fn test_fetch_proxy_non_200() {
        let url = serve_once("503 Service Unavailable", "down").await;
        let result = ProxySupplier::new(url).fetch_proxy().await;
        assert!(matches!(result, Err(ProxyError::Status(code)) if code.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_fetch_proxy_empty_body() {
        let url = serve_once("200 OK", "\n \n").await;
        let result = ProxySupplier::new(url).fetch_proxy().await;
        assert!(matches!(result, Err(ProxyError::EmptyList)));
    }

    #[tokio::test]
    async fn test_fetch_proxy_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result = ProxySupplier::new(format!("http://{addr}/"))
            .fetch_proxy()
            .await;
        assert!(matches!(result, Err(ProxyError::Network(_))));
    }
}
