//! Dependency-ordered batch loader
//!
//! Persists a [`TaxonomyGraph`] rank by rank (class, order, family, genus,
//! species). A node is only submitted once its parent has a storage
//! identifier, so every persisted `parent_id` points at a row that already
//! exists.
//!
//! A batch that cannot be persisted is recorded and skipped. Its nodes never
//! get identifiers, which makes every descendant batch fail parent resolution
//! further down. Those failures are reported node by node.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use aviatlas_common::{AviatlasError, Result as CommonResult};

use super::error::TaxonomyError;
use super::hierarchy::TaxonomyGraph;
use super::models::{NodeKey, Rank, TaxonomyNode, TaxonomyRecord};
use super::retry::RetryPolicy;
use super::storage::TaxonomyStore;

/// Reason recorded for batches held back by missing parents
pub const UNRESOLVED_PARENTS: &str = "unresolved parents";

/// Canonical key to storage identifier, filled as batches succeed
#[derive(Debug, Clone, Default)]
pub struct NodeIdentifierMap {
    ids: HashMap<NodeKey, Uuid>,
}

impl NodeIdentifierMap {
    pub fn get(&self, key: &str) -> Option<Uuid> {
        self.ids.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, Uuid)> {
        self.ids.iter().map(|(k, &v)| (k, v))
    }

    fn insert(&mut self, key: NodeKey, id: Uuid) {
        self.ids.insert(key, id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedParent {
    pub key: NodeKey,
    pub parent_key: NodeKey,
}

/// A batch that was not persisted
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub rank: Rank,
    /// 1-based position of the batch within its rank
    pub batch_number: usize,
    pub keys: Vec<NodeKey>,
    /// Insert attempts made; 0 when the batch was never submitted
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadOutcome {
    #[serde(skip)]
    pub ids: NodeIdentifierMap,
    pub batches_submitted: usize,
    pub batches_succeeded: usize,
    pub inserted: usize,
    pub failures: Vec<BatchFailure>,
    pub unresolved: Vec<UnresolvedParent>,
    pub errors: Vec<String>,
}

impl LoadOutcome {
    /// Every node received an identifier
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }

    fn record_error(&mut self, message: String) {
        error!("{}", message);
        self.errors.push(message);
    }
}

#[derive(Debug, Clone)]
pub struct DependencyOrderedLoader {
    batch_size: usize,
    retry: RetryPolicy,
    show_progress: bool,
}

impl DependencyOrderedLoader {
    pub fn new(batch_size: usize, retry: RetryPolicy) -> CommonResult<Self> {
        if batch_size == 0 {
            return Err(AviatlasError::Config("Batch size must be greater than 0".to_string()));
        }
        Ok(Self {
            batch_size,
            retry,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Persist every node of `graph`, parents strictly before children
    pub async fn load<S>(&self, graph: &TaxonomyGraph, store: &S) -> LoadOutcome
    where
        S: TaxonomyStore + ?Sized,
    {
        let mut outcome = LoadOutcome::default();
        let pb = self.progress_bar(graph.len() as u64);

        for rank in Rank::INSERTION_ORDER {
            let nodes: Vec<&TaxonomyNode> = graph.nodes_of_rank(rank).collect();
            if nodes.is_empty() {
                continue;
            }
            info!(rank = %rank, count = nodes.len(), "Loading {} nodes", rank);
            pb.set_message(format!("Inserting {} nodes", rank));

            for (index, batch) in nodes.chunks(self.batch_size).enumerate() {
                self.load_batch(rank, index + 1, batch, store, &mut outcome).await;
                pb.inc(batch.len() as u64);
            }
        }
        pb.finish_and_clear();

        info!(
            inserted = outcome.inserted,
            batches = outcome.batches_submitted,
            failed = outcome.failures.len(),
            "Load finished"
        );
        outcome
    }

    async fn load_batch<S>(
        &self,
        rank: Rank,
        batch_number: usize,
        batch: &[&TaxonomyNode],
        store: &S,
        outcome: &mut LoadOutcome,
    ) where
        S: TaxonomyStore + ?Sized,
    {
        let keys: Vec<NodeKey> = batch.iter().map(|n| n.key.clone()).collect();
        let now = Utc::now();

        // Resolve every parent before anything is sent
        let mut records = Vec::with_capacity(batch.len());
        let mut unresolved = Vec::new();
        for node in batch {
            let parent_id = match &node.parent_key {
                None => None,
                Some(parent_key) => match outcome.ids.get(parent_key.as_str()) {
                    Some(id) => Some(id),
                    None => {
                        unresolved.push(UnresolvedParent {
                            key: node.key.clone(),
                            parent_key: parent_key.clone(),
                        });
                        continue;
                    },
                },
            };
            records.push(TaxonomyRecord::from_node(node, parent_id, now));
        }

        if !unresolved.is_empty() {
            warn!(
                rank = %rank,
                batch = batch_number,
                unresolved = unresolved.len(),
                "Skipping batch with unresolved parents"
            );
            // Siblings whose parents did resolve are not submitted either
            for node in batch {
                if unresolved.iter().any(|missing| missing.key == node.key) {
                    continue;
                }
                outcome.record_error(
                    TaxonomyError::HeldBack {
                        key: node.key.clone(),
                        rank,
                        batch_number,
                    }
                    .to_string(),
                );
            }
            for missing in unresolved {
                outcome.record_error(
                    TaxonomyError::UnresolvedParent {
                        key: missing.key.clone(),
                        parent_key: missing.parent_key.clone(),
                    }
                    .to_string(),
                );
                outcome.unresolved.push(missing);
            }
            outcome.failures.push(BatchFailure {
                rank,
                batch_number,
                keys,
                attempts: 0,
                message: UNRESOLVED_PARENTS.to_string(),
            });
            return;
        }

        outcome.batches_submitted += 1;
        let label = format!("Insert {} batch {}", rank, batch_number);
        let result = self
            .retry
            .run(&label, |_| store.insert_batch(&records))
            .await;

        match result {
            Ok(ids) => {
                if ids.len() < batch.len() {
                    warn!(
                        rank = %rank,
                        batch = batch_number,
                        expected = batch.len(),
                        returned = ids.len(),
                        "Storage returned fewer identifiers than records"
                    );
                }
                let assigned = ids.len().min(batch.len());
                for (node, id) in batch.iter().zip(ids) {
                    outcome.ids.insert(node.key.clone(), id);
                }
                for node in &batch[assigned..] {
                    outcome.record_error(TaxonomyError::MissingIdentifier(node.key.clone()).to_string());
                }
                outcome.inserted += assigned;
                outcome.batches_succeeded += 1;
                info!(rank = %rank, batch = batch_number, count = assigned, "Inserted batch");
            },
            Err(e) => {
                outcome.record_error(format!("Failed to insert {} batch {}: {}", rank, batch_number, e));
                outcome.failures.push(BatchFailure {
                    rank,
                    batch_number,
                    keys,
                    attempts: e.attempts,
                    message: format!("{:#}", e.last_error),
                });
            },
        }
    }
}
