//! HTTP client for the decree archive.
//!
//! [`DocumentFetcher`] is the seam the URL prober talks to; [`HttpClient`] is
//! its reqwest-backed implementation.

mod prober;

pub use prober::{head_indicates_presence, probe, Probe};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::debug;

use crate::config::DEFAULT_USER_AGENT;

/// HEAD probes never wait longer than this, whatever the request timeout.
pub const MAX_HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Redirects followed before a request fails.
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),
}

/// Status and body of a GET.
///
/// The body is only read for 2xx responses.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface needed to probe and download decrees.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Issue a HEAD request and return its status code.
    async fn head_status(&self, url: &str) -> Result<u16, FetchError>;

    /// Issue a GET request.
    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    request_delay: Duration,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn build(self) -> Result<HttpClient, FetchError> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let client = HttpClient::build_client(&user_agent, self.timeout)?;

        Ok(HttpClient {
            client,
            timeout: self.timeout,
            request_delay: self.request_delay,
        })
    }
}

/// reqwest-backed archive client.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a builder; `timeout` applies to every GET.
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            request_delay: Duration::ZERO,
            user_agent: None,
        }
    }

    fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, FetchError> {
        Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::from)
    }

    fn head_timeout(&self) -> Duration {
        self.timeout.min(MAX_HEAD_TIMEOUT)
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpClient {
    async fn head_status(&self, url: &str) -> Result<u16, FetchError> {
        let response = self
            .client
            .head(url)
            .timeout(self.head_timeout())
            .send()
            .await;
        self.pause().await;
        let status = response?.status().as_u16();
        debug!("HEAD {} -> {}", url, status);
        Ok(status)
    }

    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let response = self.client.get(url).send().await;
        self.pause().await;
        let response = response?;
        let status = response.status().as_u16();
        debug!(
            "GET {} -> {} ({:?} bytes)",
            url,
            status,
            response.content_length()
        );

        let body = if response.status().is_success() {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };
        Ok(FetchedBody { status, body })
    }
}
