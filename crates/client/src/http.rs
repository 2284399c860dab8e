//! HTTP transport with bounded retry and exponential backoff.

use std::time::Duration;

use datagate_core::{GatewayError, GatewayResult};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::GatewayConfig;

/// Longest single backoff sleep, regardless of retry count or Retry-After.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Pooled HTTP transport shared by the auth session and the gateway client.
///
/// Retries transport failures, timeouts, 5xx, and 429 with exponential
/// backoff; other 4xx responses surface immediately. A successful return
/// always carries a 2xx response.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Duration,
    max_retries: usize,
    base_backoff: Duration,
}

impl HttpTransport {
    /// Build a transport from the client configuration.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] if the underlying client cannot be
    /// constructed.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| GatewayError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_retries: config.max_retries,
            base_backoff: config.base_backoff,
        })
    }

    /// Create a request builder on the shared pool.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request with retry semantics.
    ///
    /// # Errors
    /// Returns the final classification once retries are exhausted: `Network`
    /// or `Timeout` for transport failures, `RateLimit` for 429, `Api` for
    /// other non-2xx statuses.
    pub async fn send(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        let attempts = self.max_retries + 1;

        for attempt in 0..attempts {
            let cloned = builder.try_clone().ok_or_else(|| {
                GatewayError::Config(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            let request = cloned
                .build()
                .map_err(|err| GatewayError::Config(format!("failed to build request: {err}")))?;
            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt = attempt + 1, %method, %url, "sending gateway request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %url, %status, "received response");

                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = error_from_response(response).await;
                    if error.should_retry() && attempt + 1 < attempts {
                        warn!(%method, %url, %status, "retryable response, backing off");
                        let hint = match &error {
                            GatewayError::RateLimit { retry_after, .. } => *retry_after,
                            _ => None,
                        };
                        self.sleep_before_retry(attempt + 1, hint).await;
                        continue;
                    }
                    return Err(error);
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %url, error = %err, "request failed");

                    if is_retryable_transport_error(&err) && attempt + 1 < attempts {
                        self.sleep_before_retry(attempt + 1, None).await;
                        continue;
                    }
                    return Err(self.classify_transport_error(&err));
                }
            }
        }

        Err(GatewayError::Network("retries exhausted without a result".into()))
    }

    /// Backoff before retry `retry_number` (1-indexed): base, 2x base,
    /// 4x base, ... capped at 30s. A Retry-After hint overrides the schedule,
    /// under the same cap.
    fn backoff_delay(&self, retry_number: usize, retry_after: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after {
            return Duration::from_secs(seconds).min(MAX_BACKOFF);
        }
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1 << shift).min(MAX_BACKOFF)
    }

    async fn sleep_before_retry(&self, retry_number: usize, retry_after: Option<u64>) {
        let delay = self.backoff_delay(retry_number, retry_after);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn classify_transport_error(&self, err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Map a non-2xx response to the error taxonomy, consuming its body.
///
/// The message is taken from the body's `message` or `error` field when the
/// body is JSON, else from the raw body text.
pub async fn error_from_response(response: Response) -> GatewayError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.clone()
            }
        });

    if status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::RateLimit { message, retry_after }
    } else {
        GatewayError::Api { status: status.as_u16(), message }
    }
}
