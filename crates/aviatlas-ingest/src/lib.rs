//! AviAtlas Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads the eBird reference taxonomy into the `bird_taxonomy` table as a
//! five-level tree (class → order → family → genus → species).
//!
//! # Example
//!
//! ```no_run
//! use aviatlas_ingest::config::IngestConfig;
//! use aviatlas_ingest::ebird_taxonomy::{EbirdTaxonomyPipeline, RestTaxonomyStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = RestTaxonomyStore::from_config(&config)?;
//!     let pipeline = EbirdTaxonomyPipeline::new(config);
//!     let report = pipeline.run("./data/eBird_taxonomy_v2024.csv", Some(&store)).await?;
//!     tracing::info!("{}", report.summary_line());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ebird_taxonomy;
