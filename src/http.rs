use crate::error::{Error, Result};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_BACKOFF_MS: u64 = 30_000;

/// Thin reqwest wrapper used by the LLM client: JSON POST with retry on
/// transient transport failures.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    base_delay_ms: u64,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::http(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay_ms: 1000,
        })
    }

    pub async fn post_json_raw(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<String> {
        let mut delay = self.base_delay_ms;
        let mut last_error = Error::http("no attempts made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, delay_ms = delay, url, "retrying request");
                sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(MAX_BACKOFF_MS);
            }

            let mut req = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
            for (k, v) in headers {
                req = req.header(*k, *v);
            }

            match req.send().await {
                Ok(resp) => return handle_response(resp).await,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(attempt, error = %e, "transient failure, will retry");
                    last_error = Error::http(e.to_string());
                }
                Err(e) => return Err(Error::http(e.to_string())),
            }
        }

        Err(last_error)
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let host = resp.url().host_str().unwrap_or("unknown").to_string();

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
            resp.text().await.map_err(|e| Error::http(e.to_string()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            Err(Error::RateLimit {
                platform: host,
                retry_after_secs: retry_after,
            })
        }
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::api_with_status(host, body, status.as_u16()))
        }
    }
}
