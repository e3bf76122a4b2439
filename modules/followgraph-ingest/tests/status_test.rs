use followgraph_common::{Vertex, VertexType};
use followgraph_graph::testing::{vertex, MemoryGraphStore};
use followgraph_ingest::{collect_status, Checkpoint, CheckpointStore};

fn sized(id: &str, vertex_type: VertexType, followers: u64, following: u64) -> Vertex {
    let mut v = vertex(id, vertex_type, 0.0);
    v.followers = followers;
    v.following = following;
    v
}

#[tokio::test]
async fn status_reports_counts_means_and_checkpoint() {
    let mut influencer = sized("1", VertexType::Influencer, 1_000, 10);
    influencer.influence_score = 9.0;
    let store = MemoryGraphStore::new()
        .with_vertex(influencer)
        .with_vertex(sized("2", VertexType::Account, 200, 30))
        .with_vertex(sized("3", VertexType::Collection, 0, 50));

    let dir = tempfile::tempdir().unwrap();
    let checkpoints = CheckpointStore::new(dir.path().join("progress.txt"));
    let checkpoint = Checkpoint {
        influencer_id: "1".into(),
        page_token: Some("t2".into()),
    };
    checkpoints.save(&checkpoint).unwrap();

    let report = collect_status(&store, &checkpoints).await.unwrap();

    assert_eq!(report.checkpoint, Some(checkpoint));
    assert_eq!((report.influencers, report.accounts, report.collections), (1, 1, 1));
    assert_eq!(report.mean_influence, Some(3.0));
    assert_eq!(report.mean_followers, Some(400.0));
    assert_eq!(report.mean_following, Some(30.0));

    let text = report.to_string();
    assert!(text.contains("Next influencer:    1 (page t2)"));
    assert!(text.contains("Mean followers:     400.00"));
}

#[tokio::test]
async fn empty_graph_without_checkpoint_has_no_means() {
    let store = MemoryGraphStore::new();
    let dir = tempfile::tempdir().unwrap();
    let checkpoints = CheckpointStore::new(dir.path().join("progress.txt"));

    let report = collect_status(&store, &checkpoints).await.unwrap();

    assert_eq!(report.checkpoint, None);
    assert_eq!(report.accounts, 0);
    assert_eq!(report.mean_followers, None);
    assert!(report.to_string().contains("Next influencer:    first in graph order"));
}
