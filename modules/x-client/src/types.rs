use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// A user as returned by the `following` endpoint with
/// `user.fields=id,name,username,public_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
}

/// One page of the `GET /users/{id}/following` response.
///
/// Users that follow nobody come back without a `data` key at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowingPage {
    #[serde(default)]
    pub data: Vec<UserProfile>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<u32>,
}

/// Rate-limit headers attached to a single response. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimit {
    pub remaining: Option<u64>,
    pub reset_epoch_seconds: Option<f64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        };
        Self {
            remaining: header(RATE_LIMIT_REMAINING).and_then(|s| s.parse().ok()),
            reset_epoch_seconds: header(RATE_LIMIT_RESET)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|reset| reset.is_finite()),
        }
    }

    /// A 429 without a remaining count is treated as a spent daily quota.
    pub fn is_exhausted(&self) -> bool {
        self.remaining.unwrap_or(0) == 0
    }
}

/// Result of paging through one user's following list.
#[derive(Debug, Clone, Default)]
pub struct FollowingFetch {
    /// Every profile from every page that came back successfully.
    pub profiles: Vec<UserProfile>,
    /// The fetch stopped early: daily cap, non-2xx response, or transport retries spent.
    pub exhausted: bool,
    /// Page token of the request that could not be completed. `None` when the
    /// failure happened on the first page, or when the list was fully read.
    pub resume_token: Option<String>,
    pub pages: u32,
}
