//! Dependency-ordered loading against an in-memory store

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use aviatlas_ingest::config::IngestConfig;
use aviatlas_ingest::ebird_taxonomy::{
    DependencyOrderedLoader, EbirdTaxonomyPipeline, Rank, RetryPolicy,
};
use common::{three_row_graph, write_csv, EchoStore, THREE_ROWS};
use std::time::Duration;

#[tokio::test]
async fn test_stored_parent_ids_match_identifier_map() {
    let graph = three_row_graph();
    let store = EchoStore::default();
    let loader = DependencyOrderedLoader::new(2, RetryPolicy::no_retry()).unwrap();

    let outcome = loader.load(&graph, &store).await;

    assert!(outcome.is_complete(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.ids.len(), graph.len());

    for node in graph.nodes() {
        let id = outcome.ids.get(node.key.as_str()).unwrap();
        let record = store.record(id).unwrap();
        let expected_parent = node
            .parent_key
            .as_ref()
            .map(|parent| outcome.ids.get(parent.as_str()).unwrap());
        assert_eq!(record.parent_id, expected_parent, "parent of {}", node.key);
        assert_eq!(record.rank, node.rank);
    }
}

#[tokio::test]
async fn test_parents_are_stored_before_children() {
    let graph = three_row_graph();
    let store = EchoStore::default();
    let loader = DependencyOrderedLoader::new(50, RetryPolicy::no_retry()).unwrap();

    loader.load(&graph, &store).await;

    let calls = store.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            vec!["Aves".to_string()],
            vec!["Passeriformes".to_string()],
            vec!["Corvidae".to_string(), "Passeridae".to_string()],
            vec!["Corvus".to_string(), "Passer".to_string()],
            vec![
                "American Crow".to_string(),
                "Common Raven".to_string(),
                "House Sparrow".to_string()
            ],
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_family_cascades_to_descendants_only() {
    let graph = three_row_graph();
    let store = EchoStore::failing_on("Corvidae");
    let loader = DependencyOrderedLoader::new(1, RetryPolicy::default()).unwrap();

    let started = tokio::time::Instant::now();
    let outcome = loader.load(&graph, &store).await;

    // 1s + 2s of backoff between the three Corvidae attempts
    assert_eq!(started.elapsed(), Duration::from_secs(3));

    let family_failure = outcome
        .failures
        .iter()
        .find(|f| f.rank == Rank::Family)
        .unwrap();
    assert_eq!(family_failure.attempts, 3);
    assert_eq!(family_failure.keys[0].as_str(), "family_corvidae");

    for key in ["genus_corvus", "species_amecro", "species_comrav"] {
        assert!(!outcome.ids.contains(key), "{} should not be stored", key);
        assert!(
            outcome.errors.iter().any(|e| e.contains(key)),
            "no error mentions {}",
            key
        );
    }
    assert!(outcome.ids.contains("species_houspa"));
    assert!(store.stored_names().contains(&"House Sparrow".to_string()));
    assert_eq!(outcome.unresolved.len(), 3);
    assert!(!outcome.is_complete());

    let corvidae_calls = store
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|call| call.contains(&"Corvidae".to_string()))
        .count();
    assert_eq!(corvidae_calls, 3);
}

#[tokio::test]
async fn test_pipeline_end_to_end_with_echo_store() {
    let (_dir, path) = write_csv(THREE_ROWS);
    let store = EchoStore::default();
    let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new());

    let report = pipeline.run(&path, Some(&store)).await.unwrap();

    let load = report.load.as_ref().unwrap();
    assert_eq!(report.stats.node_count, 9);
    assert_eq!(load.inserted, 9);
    assert_eq!(load.batches_submitted, 5);
    assert_eq!(load.batches_succeeded, 5);
    assert_eq!(store.call_count(), 5);
    assert!(!report.has_errors());
    assert!(report.summary_line().contains("9 inserted"));
}
