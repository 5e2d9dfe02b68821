use std::time::Duration;

use reqwest::{Client, Method, Response};

use crate::auth::AuthConfig;

const POOL_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Shared HTTP client. Internally thread-safe; the connection pool is
/// reused across all workers. Redirects follow reqwest's default limit
/// and the final status is what gets reported.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    auth: AuthConfig,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration, auth: AuthConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .pool_max_idle_per_host(POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            // Enable TCP keepalive to maintain long-lived connections and detect dead peers.
            .tcp_keepalive(Duration::from_secs(60))
            // Enable TCP_NODELAY to disable Nagle's algorithm for lower latency.
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client, auth })
    }

    /// Issue a single request with the configured auth decorations.
    pub async fn request(&self, method: Method, url: &str) -> Result<Response, FetchError> {
        let mut request = self.client.request(method.clone(), url);

        // HEAD probes want headers only; keep the accept generic.
        if method == Method::HEAD {
            request = request.header(reqwest::header::ACCEPT, "*/*");
        }

        request = self.auth.apply(request);

        request.send().await.map_err(FetchError::from_reqwest)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    Dns,

    #[error("SSL/TLS error - certificate or encryption issue")]
    Ssl,

    #[error("request timeout")]
    Timeout,

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Classify a reqwest error into our transport error taxonomy.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return FetchError::Timeout;
        }

        let error_msg_lower = error.to_string().to_lowercase();

        if error.is_connect() {
            if error_msg_lower.contains("connection refused") {
                return FetchError::ConnectionRefused;
            }
            if error_msg_lower.contains("dns")
                || error_msg_lower.contains("name resolution")
                || error_msg_lower.contains("no such host")
            {
                return FetchError::Dns;
            }
        }

        if error_msg_lower.contains("certificate")
            || error_msg_lower.contains("ssl")
            || error_msg_lower.contains("tls")
        {
            return FetchError::Ssl;
        }

        FetchError::Network(error.to_string())
    }
}
