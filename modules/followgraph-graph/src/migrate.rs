use neo4rs::query;
use tracing::info;

use crate::GraphClient;

/// Run idempotent schema migrations: the profile id constraint and the type index.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    let statements = [
        "CREATE CONSTRAINT profile_id_unique IF NOT EXISTS FOR (p:Profile) REQUIRE p.id IS UNIQUE",
        "CREATE INDEX profile_type IF NOT EXISTS FOR (p:Profile) ON (p.type)",
    ];

    for s in &statements {
        g.run(query(s)).await?;
    }

    info!("Schema migrations complete");
    Ok(())
}
