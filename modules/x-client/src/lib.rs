pub mod error;
pub mod types;

pub use error::{Result, XError};
pub use types::{FollowingFetch, FollowingPage, PageMeta, PublicMetrics, RateLimit, UserProfile};

use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

const USER_FIELDS: &str = "id,name,username,public_metrics";

const DEFAULT_PAGE_SIZE: u32 = 1000;

const DEFAULT_MAX_TRANSPORT_RETRIES: u32 = 5;

const DEFAULT_TRANSPORT_BACKOFF: Duration = Duration::from_secs(2);

/// Upper bound on any wait derived from `x-ratelimit-reset`. The rate window is 15 minutes.
pub const MAX_RESET_WAIT: Duration = Duration::from_secs(15 * 60);

/// Outcome of a single page request that reached the server.
enum PageOutcome {
    Page(FollowingPage, RateLimit),
    RateLimited(RateLimit),
}

pub struct XClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    page_size: u32,
    max_transport_retries: u32,
    transport_backoff: Duration,
}

impl XClient {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            client: reqwest::Client::new(),
            token: token.trim_start_matches("Bearer ").to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_transport_retries: DEFAULT_MAX_TRANSPORT_RETRIES,
            transport_backoff: DEFAULT_TRANSPORT_BACKOFF,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    /// Base delay between transport retries; attempt `n` waits `n * backoff`.
    pub fn with_transport_backoff(mut self, backoff: Duration) -> Self {
        self.transport_backoff = backoff;
        self
    }

    /// Page through `user_id`'s following list, starting at `page_token` when given.
    ///
    /// Never fails: every way the fetch can end early is folded into
    /// `FollowingFetch::exhausted`, with `resume_token` pointing at the page
    /// that still has to be requested.
    pub async fn fetch_following(&self, user_id: &str, page_token: Option<&str>) -> FollowingFetch {
        let mut fetch = FollowingFetch::default();
        let mut token = page_token.map(str::to_string);
        let mut transport_failures = 0u32;
        let mut last_remaining: Option<u64> = None;

        loop {
            match self.request_page(user_id, token.as_deref()).await {
                Ok(PageOutcome::Page(page, rate)) => {
                    transport_failures = 0;
                    fetch.pages += 1;
                    last_remaining = rate.remaining.or(last_remaining);
                    fetch.profiles.extend(page.data);

                    match page.meta.next_token {
                        Some(next) => token = Some(next),
                        None => break,
                    }

                    // Self-throttle: stay inside the window before asking for the next page.
                    if let Some(reset) = rate.reset_epoch_seconds {
                        self.sleep_until_reset(reset).await;
                    }
                }
                Ok(PageOutcome::RateLimited(rate)) => {
                    if rate.is_exhausted() {
                        warn!(user_id, pages = fetch.pages, "Daily rate limit cap hit");
                        return exhausted(fetch, token);
                    }
                    info!(
                        user_id,
                        remaining = rate.remaining,
                        reset = rate.reset_epoch_seconds,
                        "Rate limit hit, waiting for reset before retrying"
                    );
                    match rate.reset_epoch_seconds {
                        Some(reset) => self.sleep_until_reset(reset).await,
                        None => tokio::time::sleep(self.transport_backoff).await,
                    }
                }
                Err(XError::Api { status, message }) => {
                    error!(user_id, status, %message, "Following request failed");
                    return exhausted(fetch, token);
                }
                Err(XError::Parse(message)) => {
                    error!(user_id, %message, "Unparseable following page");
                    return exhausted(fetch, token);
                }
                Err(e) => {
                    transport_failures += 1;
                    if transport_failures > self.max_transport_retries {
                        error!(user_id, error = %e, attempts = transport_failures, "Giving up on following fetch");
                        return exhausted(fetch, token);
                    }
                    warn!(user_id, error = %e, attempt = transport_failures, "Transport error, retrying");
                    tokio::time::sleep(self.transport_backoff * transport_failures).await;
                }
            }
        }

        info!(
            user_id,
            pages = fetch.pages,
            profiles = fetch.profiles.len(),
            remaining = last_remaining,
            "Following fetch complete"
        );
        fetch
    }

    async fn sleep_until_reset(&self, reset_epoch_seconds: f64) {
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        let wait = match reset_wait(reset_epoch_seconds, now) {
            Some(wait) => wait,
            None => {
                warn!(reset_epoch_seconds, "Unusable rate limit reset, falling back to transport backoff");
                self.transport_backoff
            }
        };
        if !wait.is_zero() {
            debug!(wait_secs = wait.as_secs_f64(), "Sleeping until rate limit reset");
            tokio::time::sleep(wait).await;
        }
    }

    async fn request_page(&self, user_id: &str, token: Option<&str>) -> Result<PageOutcome> {
        let url = format!("{}/users/{}/following", self.base_url, user_id);
        let mut params = vec![
            ("max_results", self.page_size.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(token) = token {
            params.push(("pagination_token", token.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        let rate = RateLimit::from_headers(resp.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageOutcome::RateLimited(rate));
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(XError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let page: FollowingPage = serde_json::from_str(&body)?;
        debug!(user_id, count = page.data.len(), next = ?page.meta.next_token, "Fetched following page");
        Ok(PageOutcome::Page(page, rate))
    }
}

fn exhausted(mut fetch: FollowingFetch, token: Option<String>) -> FollowingFetch {
    fetch.exhausted = true;
    fetch.resume_token = token;
    fetch
}

/// Time left until `reset_epoch_seconds`, clamped to `[0, MAX_RESET_WAIT]`.
/// `None` when the value cannot be turned into a wait at all.
fn reset_wait(reset_epoch_seconds: f64, now_epoch_seconds: f64) -> Option<Duration> {
    let wait = reset_epoch_seconds - now_epoch_seconds;
    if !wait.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(wait.clamp(0.0, MAX_RESET_WAIT.as_secs_f64())).ok()
}
