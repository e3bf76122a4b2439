use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::traits::CollectionOracle;

/// Collection lookup against the relational `social_media` table.
pub struct PgCollectionOracle {
    pool: PgPool,
    network_site_id: i32,
}

impl PgCollectionOracle {
    pub fn new(pool: PgPool, network_site_id: i32) -> Self {
        Self {
            pool,
            network_site_id,
        }
    }

    /// The pool hands out a connection for this one query and takes it back
    /// on every exit path. Ids that are not numeric cannot be in the table.
    pub async fn lookup(&self, external_id: &str) -> Result<bool, sqlx::Error> {
        let Some(twitter_id) = numeric_id(external_id) else {
            debug!(external_id, "Non-numeric id, not a collection");
            return Ok(false);
        };

        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM public.social_media
                WHERE twitter_id = $1
                  AND tracking = true
                  AND social_media_sites_id = $2
            )
            "#,
        )
        .bind(twitter_id)
        .bind(self.network_site_id)
        .fetch_one(&self.pool)
        .await
    }
}

fn numeric_id(external_id: &str) -> Option<i64> {
    external_id.trim().parse().ok()
}

#[async_trait]
impl CollectionOracle for PgCollectionOracle {
    async fn is_tracked_collection(&self, external_id: &str) -> bool {
        match self.lookup(external_id).await {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(external_id, error = %e, "Collection lookup failed, classifying as account");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_parse_to_bigint() {
        assert_eq!(numeric_id("4646461997"), Some(4_646_461_997));
        assert_eq!(numeric_id("abc"), None);
        assert_eq!(numeric_id(""), None);
        assert_eq!(numeric_id("99999999999999999999"), None);
    }
}
