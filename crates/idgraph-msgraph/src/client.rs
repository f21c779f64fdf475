//! Authenticated GET with OData paging and throttling retries.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use idgraph_core::RawEntity;

use crate::{MsGraphConfig, MsGraphError, MsGraphResult, TokenCache};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// One page of an OData collection.
#[derive(Debug, Default, Deserialize)]
pub struct ODataPage {
    #[serde(default)]
    pub value: Vec<RawEntity>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct MsGraphClient {
    http: reqwest::Client,
    tokens: TokenCache,
    graph_base: String,
    max_retries: u32,
}

impl MsGraphClient {
    pub fn new(config: &MsGraphConfig) -> MsGraphResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MsGraphError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            tokens: TokenCache::new(http.clone(), config),
            http,
            graph_base: config.graph_base().to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Whether `url` points back at the configured Graph endpoint. The bearer
    /// token is only ever sent to such URLs.
    pub fn is_trusted(&self, url: &str) -> bool {
        url.strip_prefix(self.graph_base.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn graph_base(&self) -> &str {
        &self.graph_base
    }

    /// GET one page. Retries 429 and transient 5xx honoring `Retry-After`,
    /// and refreshes the token once on 401.
    pub async fn get_page(&self, url: &str) -> MsGraphResult<ODataPage> {
        let mut attempts = 0u32;
        let mut reauthenticated = false;

        loop {
            let token = self.tokens.get_token().await?;
            let response = self.http.get(url).bearer_auth(&token).send().await?;
            let status = response.status();

            if status.is_success() {
                let page: ODataPage = response.json().await?;
                debug!(url, records = page.value.len(), more = page.next_link.is_some(), "Fetched page");
                return Ok(page);
            }

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                debug!(url, "Access token rejected, refreshing");
                self.tokens.invalidate().await;
                reauthenticated = true;
                continue;
            }

            if is_retryable(status) {
                if attempts >= self.max_retries {
                    return Err(MsGraphError::Throttled {
                        status: status.as_u16(),
                        attempts,
                    });
                }
                let delay = retry_after(response.headers()).unwrap_or_else(|| backoff(attempts));
                attempts += 1;
                warn!(
                    url,
                    status = status.as_u16(),
                    attempt = attempts,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Graph request throttled, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(MsGraphError::NotFound(url.to_string()));
            }

            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ODataError>(&body) {
                Ok(e) => format!("{}: {}", e.error.code, e.error.message),
                Err(_) => body,
            };
            return Err(MsGraphError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }

    /// Follow `@odata.nextLink` from `url` to the end of the collection.
    ///
    /// Links outside the Graph endpoint and links already followed fail the
    /// whole collection.
    pub async fn get_all(&self, url: &str) -> MsGraphResult<Vec<RawEntity>> {
        let mut records = Vec::new();
        let mut seen = HashSet::from([url.to_string()]);
        let mut next = Some(url.to_string());
        while let Some(url) = next {
            let page = self.get_page(&url).await?;
            records.extend(page.value);
            next = match page.next_link {
                Some(link) if !self.is_trusted(&link) => {
                    return Err(MsGraphError::Pagination(format!(
                        "refusing to follow nextLink outside {}",
                        self.graph_base
                    )));
                }
                Some(link) if !seen.insert(link.clone()) => {
                    return Err(MsGraphError::Pagination(format!("nextLink repeated: {link}")));
                }
                other => other,
            };
        }
        Ok(records)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// `Retry-After` in delta-seconds form; Graph does not send HTTP dates.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_BACKOFF))
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6)).min(MAX_BACKOFF)
}
