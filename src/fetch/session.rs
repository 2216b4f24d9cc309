use crate::config::FetchConfig;
use crate::fetch::{FetchError, RetryPolicy};
use reqwest::{Client, Method, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

/// Builds the HTTP client shared by every fetch
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A failed attempt and whether it may be repeated
struct Failure {
    error: FetchError,
    transient: bool,
}

/// HTTP session with bounded retry
///
/// Cloning is cheap and clones share the connection pool, so one session can be
/// handed to any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct FetchSession {
    client: Client,
    policy: Arc<RetryPolicy>,
    timeout: Duration,
}

impl FetchSession {
    pub fn new(client: Client, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            client,
            policy: Arc::new(policy),
            timeout,
        }
    }

    /// Creates a session from the `[fetch]` configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            client,
            RetryPolicy::from(config),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches the body of `url` with GET
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Per-attempt timeout; the session default when `None`
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The response body of a 2xx response
    /// * `Err(FetchError)` - The classified failure of the last attempt
    pub async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, FetchError> {
        self.request(Method::GET, url, None, timeout).await
    }

    /// Sends a request with the retry policy applied
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Status in retry set | Retry with backoff |
    /// | Other 4xx/5xx | Fail immediately (`HttpStatus`) |
    /// | Timeout, connect failure, broken body | Retry with backoff (`Transport`) |
    /// | Certificate/TLS failure | Fail immediately (`Tls`) |
    /// | Undecodable response | Fail immediately (`Decode`) |
    ///
    /// Methods outside the policy's method set are never retried.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, FetchError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let repeatable = self.policy.retries_method(&method);
        let mut attempt: u32 = 0;

        loop {
            let failure = match self
                .attempt(method.clone(), url, body.clone(), timeout)
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(failure) => failure,
            };

            if !failure.transient || !repeatable || attempt >= self.policy.max_retries {
                if attempt > 0 {
                    tracing::debug!("Giving up on {} after {} attempts", url, attempt + 1);
                }
                return Err(failure.error);
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                "Fetch attempt {}/{} failed: {}; retrying in {:?}",
                attempt + 1,
                self.policy.max_retries + 1,
                failure.error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Vec<u8>, Failure> {
        let mut request = self.client.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| classify(url, &e))?;
        let status = response.status();

        if !status.is_success() {
            return Err(Failure {
                error: FetchError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                },
                transient: self.policy.retries_status(status.as_u16()),
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| classify(url, &e))
    }
}

/// Maps a reqwest error onto the fetch taxonomy
fn classify(url: &str, err: &reqwest::Error) -> Failure {
    let url = url.to_string();
    let message = describe(err);

    if is_tls_failure(err) {
        return Failure {
            error: FetchError::Tls { url, message },
            transient: false,
        };
    }

    if err.is_decode() {
        return Failure {
            error: FetchError::Decode { url, message },
            transient: false,
        };
    }

    let transient = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    Failure {
        error: FetchError::Transport { url, message },
        transient: transient && !err.is_builder(),
    }
}

/// Looks for certificate or TLS failures anywhere in the source chain
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Error message including the innermost cause
fn describe(err: &reqwest::Error) -> String {
    let mut message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    let mut source = err.source();
    let mut innermost = None;
    while let Some(cause) = source {
        innermost = Some(cause.to_string());
        source = cause.source();
    }
    if let Some(cause) = innermost {
        message.push_str(": ");
        message.push_str(&cause);
    }
    message
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            backoff_max: Duration::from_secs(config.backoff_max_secs),
            retry_statuses: config.retry_statuses.iter().copied().collect(),
            retry_methods: config
                .retry_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_uppercase().as_bytes()).ok())
                .collect(),
        }
    }
}
