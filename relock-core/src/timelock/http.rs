use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::Response;

use crate::config::DrandConfig;
use crate::error::VaultError;

/// A thin wrapper over an HTTP client for beacon requests. Sets a timeout and
/// user-agent, and retries transient failures with exponential backoff.
pub(super) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    min_delay: Duration,
}

impl Request {
    pub(super) fn new(config: &DrandConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: config.request_timeout,
            max_retries: config.max_retries,
            min_delay: config.retry_min_delay,
        }
    }

    /// Sends a GET request, retrying on timeouts, connection failures, 429
    /// and 5xx. Any other response is returned as-is.
    pub(super) async fn get(&self, url: &str) -> Result<Response, VaultError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async { self.execute(url).await })
            .retry(backoff)
            .when(|err: &RequestHandleError| err.retryable)
            .notify(|err: &RequestHandleError, delay: Duration| {
                tracing::debug!(url = %err.url, ?delay, error = %err.error, "retrying beacon request");
            })
            .await
            .map_err(Into::into)
    }

    async fn execute(&self, url: &str) -> Result<Response, RequestHandleError> {
        let result = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header("User-Agent", format!("relock/{}", env!("CARGO_PKG_VERSION")))
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if status == 429 || (500..600).contains(&status) {
                    return Err(RequestHandleError {
                        url: url.to_string(),
                        status: Some(status),
                        error: format!("request error with bad status code {status}"),
                        retryable: true,
                    });
                }
                Ok(resp)
            }
            Err(err) => Err(RequestHandleError {
                url: url.to_string(),
                status: None,
                retryable: err.is_timeout() || err.is_connect(),
                error: format!("request failed: {err}"),
            }),
        }
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl From<RequestHandleError> for VaultError {
    fn from(value: RequestHandleError) -> Self {
        Self::Network {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}
