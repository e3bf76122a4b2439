// In-memory doubles for the coordinator's seams.
//
// MockFollowing serves canned pages per user with tokens "p1", "p2", ... for
// the second page onward, and can run out of budget mid-list the way the
// daily quota does. StaticOracle answers from a fixed id set.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use x_client::{FollowingFetch, PublicMetrics, UserProfile};

use crate::traits::{CollectionOracle, FollowingSource};

pub fn profile(id: &str, followers: u64) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        username: format!("user_{id}"),
        name: format!("User {id}"),
        public_metrics: PublicMetrics {
            followers_count: followers,
            following_count: 10,
        },
    }
}

/// Token addressing page `index` of a following list. The first page has none.
pub fn page_token(index: usize) -> Option<String> {
    (index > 0).then(|| format!("p{index}"))
}

fn page_index(token: Option<&str>) -> usize {
    token
        .and_then(|t| t.strip_prefix('p'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct MockFollowing {
    pages: HashMap<String, Vec<Vec<UserProfile>>>,
    failing_users: HashSet<String>,
    budget: Mutex<Option<u32>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl MockFollowing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_id`'s following list, one inner Vec per page.
    pub fn on_user(mut self, user_id: &str, pages: Vec<Vec<UserProfile>>) -> Self {
        self.pages.insert(user_id.to_string(), pages);
        self
    }

    /// Every fetch for `user_id` fails on its first page.
    pub fn failing_user(mut self, user_id: &str) -> Self {
        self.failing_users.insert(user_id.to_string());
        self
    }

    /// Serve at most `pages` pages in total before reporting exhaustion.
    pub fn exhaust_after(self, pages: u32) -> Self {
        self.set_budget(Some(pages));
        self
    }

    /// Reset the page budget, e.g. to simulate the next day's quota.
    pub fn set_budget(&self, pages: Option<u32>) {
        *self.budget.lock().unwrap() = pages;
    }

    /// Every `(user_id, page_token)` pair fetched so far, in order.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FollowingSource for MockFollowing {
    async fn fetch_following(&self, user_id: &str, page_token_in: Option<&str>) -> FollowingFetch {
        self.requests
            .lock()
            .unwrap()
            .push((user_id.to_string(), page_token_in.map(str::to_string)));

        let mut fetch = FollowingFetch::default();
        if self.failing_users.contains(user_id) {
            fetch.exhausted = true;
            fetch.resume_token = page_token_in.map(str::to_string);
            return fetch;
        }

        let Some(pages) = self.pages.get(user_id) else {
            return fetch;
        };

        let mut budget = self.budget.lock().unwrap();
        for (index, page) in pages.iter().enumerate().skip(page_index(page_token_in)) {
            if let Some(left) = budget.as_mut() {
                if *left == 0 {
                    fetch.exhausted = true;
                    fetch.resume_token = page_token(index);
                    return fetch;
                }
                *left -= 1;
            }
            fetch.profiles.extend(page.iter().cloned());
            fetch.pages += 1;
        }
        fetch
    }
}

#[derive(Default)]
pub struct StaticOracle {
    collections: HashSet<String>,
}

impl StaticOracle {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            collections: ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl CollectionOracle for StaticOracle {
    async fn is_tracked_collection(&self, external_id: &str) -> bool {
        self.collections.contains(external_id)
    }
}
