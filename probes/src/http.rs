//! Native HTTP probe executor.
//!
//! Issues each attempt through a shared, pooled `reqwest` client. The whole
//! response body is read so that an attempt costs the server what a full
//! download would.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use stress_bench_core::{ProbeError, ProbeExecutor, ProbeRequest, ProbeStatus};
use tokio_util::sync::CancellationToken;

// ============================================================================
// HTTP Client Pool
// ============================================================================

/// Configuration for the HTTP client pool.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Client-wide request timeout; a request's own timeout takes precedence
    pub request_timeout: Option<Duration>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,

    /// Follow redirects (curl `-L`)
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 256,
            request_timeout: None,
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Some(Duration::from_secs(60)),
            follow_redirects: true,
        }
    }
}

impl HttpConfig {
    /// Create config with a client-wide request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Create config with custom connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-host idle connection cap.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }
}

/// Pooled HTTP client shared by every worker of a run.
///
/// `reqwest::Client` already pools connections internally; this wrapper
/// keeps the configuration it was built from next to it.
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    client: Client,
    config: HttpConfig,
}

impl HttpClientPool {
    /// Create a new HTTP client pool with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.connect_timeout)
            .redirect(redirect);

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(keepalive) = config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Get a reference to the underlying HTTP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the configuration for this pool.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

// ============================================================================
// Probe
// ============================================================================

/// Probe executor backed by a native HTTP client.
///
/// Any HTTP response counts as a success unless
/// [`HttpProbe::fail_on_http_error`] is enabled, in which case 4xx and 5xx
/// responses are failures.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    pool: HttpClientPool,
    fail_on_http_error: bool,
}

impl HttpProbe {
    /// Create a probe over a fresh client pool.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_pool(HttpClientPool::new(config)?))
    }

    /// Create a probe over an existing pool.
    pub fn from_pool(pool: HttpClientPool) -> Self {
        Self {
            pool,
            fail_on_http_error: false,
        }
    }

    /// Count 4xx/5xx responses as failures.
    pub fn fail_on_http_error(mut self, enabled: bool) -> Self {
        self.fail_on_http_error = enabled;
        self
    }

    fn judge(&self, status: StatusCode) -> ProbeStatus {
        if self.fail_on_http_error && (status.is_client_error() || status.is_server_error()) {
            ProbeStatus::failure(format!("HTTP {status}"))
        } else {
            ProbeStatus::Success
        }
    }

    async fn send(&self, request: &ProbeRequest) -> Result<StatusCode, ProbeError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ProbeError::Transport(format!("invalid method {:?}: {e}", request.method)))?;

        let mut builder = self
            .pool
            .client()
            .request(method, &request.target)
            .header(header::USER_AGENT, &request.user_agent);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;
        let status = response.status();
        response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;

        Ok(status)
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Option<Duration>) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(timeout.unwrap_or_default())
    } else {
        ProbeError::Transport(err.to_string())
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    fn name(&self) -> &str {
        "http"
    }

    async fn probe(
        &self,
        request: &ProbeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProbeStatus, ProbeError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            status = self.send(request) => {
                let status = status?;
                tracing::trace!(target = %request.target, %status, "HTTP probe completed");
                Ok(self.judge(status))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
