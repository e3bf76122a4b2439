// Cleanup pass behavior over the in-memory store.

use followgraph_common::{Edge, VertexType};
use followgraph_graph::prune_low_influence;
use followgraph_graph::testing::{vertex, MemoryGraphStore};

fn ids(store: &MemoryGraphStore) -> Vec<String> {
    store.vertices().into_iter().map(|v| v.id).collect()
}

#[tokio::test]
async fn accounts_strictly_below_mean_are_deleted() {
    let store = MemoryGraphStore::new();
    for s in 1..=5 {
        store.insert(vertex(&format!("a{s}"), VertexType::Account, s as f64));
    }

    let stats = prune_low_influence(&store).await.unwrap();

    assert_eq!(stats.mean_score, Some(3.0));
    assert_eq!(stats.deleted, 2);
    assert_eq!(ids(&store), vec!["a3", "a4", "a5"]);
}

#[tokio::test]
async fn mean_covers_every_vertex_but_only_accounts_are_pruned() {
    // Mean over all four is 5.0; the collection and the account sit below it.
    let store = MemoryGraphStore::new()
        .with_vertex(vertex("inf", VertexType::Influencer, 14.0))
        .with_vertex(vertex("col", VertexType::Collection, 1.0))
        .with_vertex(vertex("low", VertexType::Account, 0.0))
        .with_vertex(vertex("even", VertexType::Account, 5.0));

    let stats = prune_low_influence(&store).await.unwrap();

    assert_eq!(stats.mean_score, Some(5.0));
    assert_eq!(ids(&store), vec!["col", "even", "inf"]);
}

#[tokio::test]
async fn deleting_a_vertex_drops_its_edges() {
    let store = MemoryGraphStore::new()
        .with_vertex(vertex("inf", VertexType::Influencer, 10.0))
        .with_vertex(vertex("keep", VertexType::Account, 10.0))
        .with_vertex(vertex("drop", VertexType::Account, 0.0))
        .with_edge("inf", "keep")
        .with_edge("inf", "drop")
        .with_edge("drop", "keep");

    prune_low_influence(&store).await.unwrap();

    assert_eq!(
        store.edges(),
        vec![Edge {
            from: "inf".to_string(),
            to: "keep".to_string()
        }]
    );
}

#[tokio::test]
async fn failed_delete_is_counted_and_skipped() {
    let store = MemoryGraphStore::new()
        .with_vertex(vertex("a", VertexType::Account, 0.0))
        .with_vertex(vertex("b", VertexType::Account, 0.0))
        .with_vertex(vertex("c", VertexType::Account, 9.0));
    store.fail_writes_for("a");

    let stats = prune_low_influence(&store).await.unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(ids(&store), vec!["a", "c"]);
}

#[tokio::test]
async fn empty_graph_is_a_no_op() {
    let store = MemoryGraphStore::new();
    let stats = prune_low_influence(&store).await.unwrap();
    assert_eq!(stats.mean_score, None);
    assert_eq!(stats.deleted, 0);
}
