// Seams between the coordinator and its external collaborators.
//
// FollowingSource wraps the X API client; CollectionOracle wraps the
// relational lookup. Both have in-memory doubles in `testing` so the
// coordinator can be exercised without network or database.

use async_trait::async_trait;
use x_client::{FollowingFetch, XClient};

#[async_trait]
pub trait FollowingSource: Send + Sync {
    /// Page through `user_id`'s following list from `page_token` onward.
    /// Early stops are reported through `FollowingFetch::exhausted`.
    async fn fetch_following(&self, user_id: &str, page_token: Option<&str>) -> FollowingFetch;
}

#[async_trait]
impl FollowingSource for XClient {
    async fn fetch_following(&self, user_id: &str, page_token: Option<&str>) -> FollowingFetch {
        XClient::fetch_following(self, user_id, page_token).await
    }
}

#[async_trait]
pub trait CollectionOracle: Send + Sync {
    /// Whether `external_id` is a tracked collection. Lookup failures answer `false`.
    async fn is_tracked_collection(&self, external_id: &str) -> bool;
}
