//! In-memory taxonomy hierarchy
//!
//! [`HierarchyBuilder`] consumes source rows in order and grows a
//! [`TaxonomyGraph`] rooted at the single `Aves` class node:
//!
//! ```text
//! class_aves
//! └── order_passeriformes
//!     └── family_corvidae
//!         ├── genus_corvus
//!         │   └── species_amecro
//!         └── species_<code>      (no safe genus)
//! ```
//!
//! Order, family and genus nodes are deduplicated by canonical key; species
//! are keyed by eBird code. A bad row is recorded and skipped, it never
//! aborts the build.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use aviatlas_common::Result as CommonResult;

use super::canonical;
use super::error::TaxonomyError;
use super::models::{NodeKey, NodeMetadata, Rank, SourceRow, TaxonomyNode};
use super::validation::{RowDefect, RowValidator, ValidatedRow};

/// What to do when a family shows up under a second order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyConflictPolicy {
    /// Record a warning and keep the family under its first order
    #[default]
    Warn,
    /// Reject the row
    Reject,
}

impl std::str::FromStr for FamilyConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" | "warning" => Ok(Self::Warn),
            "reject" | "error" => Ok(Self::Reject),
            other => Err(format!("Invalid family conflict policy: {}", other)),
        }
    }
}

/// Node set keyed by canonical key, in creation order
#[derive(Debug, Clone, Default)]
pub struct TaxonomyGraph {
    nodes: Vec<TaxonomyNode>,
    index: HashMap<NodeKey, usize>,
}

impl TaxonomyGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TaxonomyNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn root(&self) -> Option<&TaxonomyNode> {
        self.get(canonical::ROOT_KEY)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaxonomyNode> {
        self.nodes.iter()
    }

    /// Nodes of one rank, in the order they were created
    pub fn nodes_of_rank(&self, rank: Rank) -> impl Iterator<Item = &TaxonomyNode> {
        self.nodes.iter().filter(move |n| n.rank == rank)
    }

    pub fn rank_counts(&self) -> BTreeMap<Rank, usize> {
        let mut counts: BTreeMap<Rank, usize> =
            Rank::INSERTION_ORDER.iter().map(|&r| (r, 0)).collect();
        for node in &self.nodes {
            *counts.entry(node.rank).or_default() += 1;
        }
        counts
    }

    /// Parent chain of `key`, nearest first, ending at the root
    pub fn ancestors(&self, key: &str) -> Vec<&TaxonomyNode> {
        let mut chain = Vec::new();
        let mut current = self.get(key).and_then(|n| n.parent_key.as_ref());
        while let Some(parent_key) = current {
            let Some(parent) = self.get(parent_key.as_str()) else {
                break;
            };
            // A chain can never be longer than the number of ranks
            if chain.len() >= Rank::INSERTION_ORDER.len() {
                break;
            }
            chain.push(parent);
            current = parent.parent_key.as_ref();
        }
        chain
    }

    /// Insert unless the key is already taken. Returns whether it was inserted.
    fn insert(&mut self, node: TaxonomyNode) -> bool {
        if self.index.contains_key(&node.key) {
            return false;
        }
        debug!(key = %node.key, rank = %node.rank, name = %node.name, "Created node");
        self.index.insert(node.key.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }
}

/// Data-quality findings gathered while building
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataQuality {
    pub invalid_scientific_names: Vec<(usize, String)>,
    pub missing_essential_data: Vec<(usize, String)>,
    pub duplicate_species_codes: Vec<(usize, String)>,
    pub hierarchy_inconsistencies: Vec<String>,
}

/// Counters and messages from one build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    pub total_rows: usize,
    pub processed_species: usize,
    pub node_count: usize,
    /// Rows rejected by validation
    pub skipped_invalid: usize,
    /// Valid rows whose category is not `species`
    pub skipped_category: usize,
    /// Rows that failed while creating nodes
    pub failed_rows: usize,
    pub duplicate_species: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub data_quality: DataQuality,
}

impl BuildStats {
    pub fn skipped_rows(&self) -> usize {
        self.skipped_invalid + self.skipped_category
    }
}

/// What happened to a single row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Added { species: NodeKey, parent: NodeKey },
    Invalid,
    NotSpecies,
    Duplicate,
    Failed,
}

/// Result of a completed build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: TaxonomyGraph,
    pub stats: BuildStats,
}

/// Keys a row resolves to, computed before anything is committed
struct RowKeys<'a> {
    order: NodeKey,
    family: NodeKey,
    family_name: String,
    genus: Option<(NodeKey, &'a str)>,
    species: NodeKey,
}

pub struct HierarchyBuilder {
    validator: RowValidator,
    policy: FamilyConflictPolicy,
    graph: TaxonomyGraph,
    stats: BuildStats,
    reported_conflicts: HashSet<(NodeKey, NodeKey)>,
}

impl HierarchyBuilder {
    pub fn new(policy: FamilyConflictPolicy) -> anyhow::Result<Self> {
        let mut builder = Self {
            validator: RowValidator::new()?,
            policy,
            graph: TaxonomyGraph::default(),
            stats: BuildStats::default(),
            reported_conflicts: HashSet::new(),
        };
        builder.ensure_root();
        Ok(builder)
    }

    pub fn graph(&self) -> &TaxonomyGraph {
        &self.graph
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Consume numbered rows until exhausted
    ///
    /// A read error from the source aborts the build and is returned as-is.
    pub fn build<I>(mut self, rows: I) -> CommonResult<BuildOutput>
    where
        I: IntoIterator<Item = CommonResult<(usize, SourceRow)>>,
    {
        for item in rows {
            let (row_number, row) = item?;
            self.ingest(row_number, &row);
        }
        Ok(self.finish())
    }

    pub fn finish(mut self) -> BuildOutput {
        self.stats.node_count = self.graph.len();

        info!(
            nodes = self.stats.node_count,
            species = self.stats.processed_species,
            total_rows = self.stats.total_rows,
            skipped = self.stats.skipped_rows(),
            "Built taxonomy tree"
        );
        if !self.stats.warnings.is_empty() {
            warn!(count = self.stats.warnings.len(), "Build produced warnings");
        }
        if !self.stats.errors.is_empty() {
            warn!(count = self.stats.errors.len(), "Build encountered row errors");
        }

        BuildOutput {
            graph: self.graph,
            stats: self.stats,
        }
    }

    /// Feed one source row through validation and into the graph
    pub fn ingest(&mut self, row_number: usize, row: &SourceRow) -> RowOutcome {
        self.stats.total_rows += 1;
        self.ensure_root();

        let validated = match self.validator.validate(row_number, row) {
            Ok(validated) => validated,
            Err(defects) => {
                self.record_defects(defects);
                self.stats.skipped_invalid += 1;
                return RowOutcome::Invalid;
            },
        };

        if !validated.is_species() {
            self.stats.skipped_category += 1;
            return RowOutcome::NotSpecies;
        }

        match self.add_species(&validated) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("Row {}: {}", row_number, e);
                warn!(row = row_number, error = %e, "Failed to add row to hierarchy");
                self.stats.errors.push(message);
                self.stats.failed_rows += 1;
                RowOutcome::Failed
            },
        }
    }

    fn ensure_root(&mut self) {
        if self.graph.contains(canonical::ROOT_KEY) {
            return;
        }
        self.graph.insert(TaxonomyNode {
            key: canonical::class_key(),
            name: "Aves".to_string(),
            rank: Rank::Class,
            scientific_name: Some("Aves".to_string()),
            common_name: Some("Birds".to_string()),
            parent_key: None,
            external_code: None,
            order_name: None,
            family_name: None,
            species_group: None,
            metadata: NodeMetadata {
                description: Some("Class of all birds".to_string()),
                ..NodeMetadata::default()
            },
        });
        info!("Created Aves class node");
    }

    fn record_defects(&mut self, defects: Vec<RowDefect>) {
        for defect in defects {
            match &defect {
                RowDefect::InvalidScientificName { row, value } => self
                    .stats
                    .data_quality
                    .invalid_scientific_names
                    .push((*row, value.clone())),
                RowDefect::MissingField { row, field } => self
                    .stats
                    .data_quality
                    .missing_essential_data
                    .push((*row, field.to_string())),
                RowDefect::CommonNameTooLong { .. } => {},
            }
            debug!(defect = %defect, "Row failed validation");
            self.stats.errors.push(defect.to_string());
        }
    }

    fn resolve_keys<'a>(&self, row: &'a ValidatedRow) -> Result<RowKeys<'a>, TaxonomyError> {
        let order = canonical::order_key(&row.order)?;
        let (family, family_name) = canonical::family_key(&row.family)?;
        let genus = match canonical::extract_genus(&row.scientific_name) {
            Some(name) => Some((canonical::genus_key(name)?, name)),
            None => None,
        };
        Ok(RowKeys {
            order,
            family,
            family_name,
            genus,
            species: canonical::species_key(&row.species_code),
        })
    }

    /// Check that an existing family stays under the order it was created with
    fn check_family_order(&mut self, row: &ValidatedRow, keys: &RowKeys<'_>) -> Result<(), TaxonomyError> {
        let Some(existing_order) = self
            .graph
            .get(keys.family.as_str())
            .and_then(|family| family.parent_key.clone())
        else {
            return Ok(());
        };
        if existing_order == keys.order {
            return Ok(());
        }

        let existing_order_name = self
            .graph
            .get(existing_order.as_str())
            .map(|n| n.name.clone())
            .unwrap_or_else(|| existing_order.to_string());
        let first_report = self
            .reported_conflicts
            .insert((keys.family.clone(), keys.order.clone()));

        if first_report {
            let inconsistency = format!(
                "Family '{}' appears in multiple orders: ['{}', '{}']",
                keys.family_name, existing_order_name, row.order
            );
            self.stats.data_quality.hierarchy_inconsistencies.push(inconsistency.clone());
            if self.policy == FamilyConflictPolicy::Warn {
                warn!(family = %keys.family, order = %row.order, "Family appears in multiple orders");
                self.stats
                    .warnings
                    .push(format!("Row {}: {}", row.row_number, inconsistency));
            }
        }

        match self.policy {
            FamilyConflictPolicy::Warn => Ok(()),
            FamilyConflictPolicy::Reject => Err(TaxonomyError::FamilyConflict {
                family: keys.family_name.clone(),
                existing_order: existing_order_name,
                order: row.order.clone(),
            }),
        }
    }

    fn add_species(&mut self, row: &ValidatedRow) -> Result<RowOutcome, TaxonomyError> {
        let keys = self.resolve_keys(row)?;

        if self.graph.contains(keys.species.as_str()) {
            let message = format!(
                "Row {}: Duplicate species code '{}' ignored",
                row.row_number, row.species_code
            );
            warn!(row = row.row_number, code = %row.species_code, "Duplicate species code");
            self.stats.warnings.push(message);
            self.stats
                .data_quality
                .duplicate_species_codes
                .push((row.row_number, row.species_code.clone()));
            self.stats.duplicate_species += 1;
            return Ok(RowOutcome::Duplicate);
        }

        self.check_family_order(row, &keys)?;

        self.graph.insert(TaxonomyNode {
            key: keys.order.clone(),
            name: row.order.clone(),
            rank: Rank::Order,
            scientific_name: Some(row.order.clone()),
            common_name: Some(row.order.clone()),
            parent_key: Some(canonical::class_key()),
            external_code: None,
            order_name: None,
            family_name: None,
            species_group: None,
            metadata: NodeMetadata {
                created_from: Some("ebird_csv".to_string()),
                ..NodeMetadata::default()
            },
        });

        self.graph.insert(TaxonomyNode {
            key: keys.family.clone(),
            name: keys.family_name.clone(),
            rank: Rank::Family,
            scientific_name: Some(keys.family_name.clone()),
            common_name: Some(row.family.clone()),
            parent_key: Some(keys.order.clone()),
            external_code: None,
            order_name: None,
            family_name: None,
            species_group: None,
            metadata: NodeMetadata {
                original_name: Some(row.family.clone()),
                ..NodeMetadata::default()
            },
        });

        let parent = match &keys.genus {
            Some((genus_key, genus_name)) => {
                self.graph.insert(TaxonomyNode {
                    key: genus_key.clone(),
                    name: genus_name.to_string(),
                    rank: Rank::Genus,
                    scientific_name: Some(genus_name.to_string()),
                    common_name: Some(genus_name.to_string()),
                    parent_key: Some(keys.family.clone()),
                    external_code: None,
                    order_name: None,
                    family_name: None,
                    species_group: None,
                    metadata: NodeMetadata::default(),
                });
                genus_key.clone()
            },
            None => {
                warn!(
                    row = row.row_number,
                    scientific_name = %row.scientific_name,
                    "Could not extract genus, attaching species to family"
                );
                self.stats.warnings.push(format!(
                    "Row {}: Could not extract genus from '{}'",
                    row.row_number, row.scientific_name
                ));
                keys.family.clone()
            },
        };

        self.graph.insert(TaxonomyNode {
            key: keys.species.clone(),
            name: row.common_name.clone(),
            rank: Rank::Species,
            scientific_name: Some(row.scientific_name.clone()),
            common_name: Some(row.common_name.clone()),
            parent_key: Some(parent.clone()),
            external_code: Some(row.species_code.clone()),
            order_name: Some(row.order.clone()),
            family_name: Some(row.family.clone()),
            species_group: row.species_group.clone(),
            metadata: NodeMetadata {
                taxon_order: row.taxon_order.clone(),
                category: Some(row.category.clone()),
                report_as: row.report_as.clone(),
                ..NodeMetadata::default()
            },
        });
        self.stats.processed_species += 1;

        Ok(RowOutcome::Added {
            species: keys.species,
            parent,
        })
    }
}
