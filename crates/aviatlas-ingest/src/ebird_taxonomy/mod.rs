//! eBird taxonomy ingestion
//!
//! Converts the flat eBird/Clements taxonomy CSV into a five-level tree and
//! loads it into the `bird_taxonomy` table:
//!
//! 1. [`reader`] checks the header and yields numbered [`SourceRow`]s
//! 2. [`validation`] turns each row into a [`ValidatedRow`] or a list of defects
//! 3. [`hierarchy`] deduplicates nodes by canonical key ([`canonical`])
//! 4. [`loader`] inserts rank by rank, resolving parent keys to stored ids
//! 5. [`report`] summarises the run
//!
//! [`EbirdTaxonomyPipeline`] wires the steps together.

pub mod audit;
pub mod canonical;
pub mod error;
pub mod hierarchy;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod retry;
pub mod storage;
pub mod validation;

pub use audit::{audit_path, CsvAudit};
pub use error::TaxonomyError;
pub use hierarchy::{
    BuildOutput, BuildStats, DataQuality, FamilyConflictPolicy, HierarchyBuilder, RowOutcome,
    TaxonomyGraph,
};
pub use loader::{BatchFailure, DependencyOrderedLoader, LoadOutcome, NodeIdentifierMap, UnresolvedParent};
pub use models::{NodeKey, NodeMetadata, Rank, SourceRow, TaxonomyNode, TaxonomyRecord};
pub use pipeline::EbirdTaxonomyPipeline;
pub use reader::TaxonomyCsvReader;
pub use report::{ConversionReport, LoadSummary};
pub use retry::{RetryExhausted, RetryPolicy};
#[cfg(feature = "database")]
pub use storage::PgTaxonomyStore;
pub use storage::{RestTaxonomyStore, TaxonomyStore};
pub use validation::{RowDefect, RowValidator, ValidatedRow};
