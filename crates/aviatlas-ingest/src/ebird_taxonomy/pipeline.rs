//! eBird taxonomy conversion pipeline
//!
//! Reader → hierarchy builder → dependency-ordered loader → report.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};

use super::hierarchy::{BuildOutput, HierarchyBuilder};
use super::loader::DependencyOrderedLoader;
use super::reader::TaxonomyCsvReader;
use super::report::{ConversionReport, LoadSummary};
use super::storage::TaxonomyStore;
use crate::config::IngestConfig;

pub struct EbirdTaxonomyPipeline {
    config: IngestConfig,
}

impl EbirdTaxonomyPipeline {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Read and build the hierarchy without touching storage
    ///
    /// Fails only when the CSV itself cannot be read.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<BuildOutput> {
        let path = path.as_ref();
        let reader = TaxonomyCsvReader::open(path)
            .with_context(|| format!("Failed to open taxonomy CSV {}", path.display()))?;
        let builder = HierarchyBuilder::new(self.config.family_conflict)?;
        let output = builder
            .build(reader)
            .with_context(|| format!("Failed to read taxonomy CSV {}", path.display()))?;
        Ok(output)
    }

    /// Build and report only
    pub async fn dry_run(&self, path: impl AsRef<Path>) -> Result<ConversionReport> {
        self.run::<dyn TaxonomyStore>(path, None).await
    }

    /// Convert the CSV at `path` and load it into `store`
    ///
    /// Nothing is written when the config says dry run or no store is given.
    /// Row, batch and report-file failures end up in the report; only an
    /// unreadable source returns `Err`.
    pub async fn run<S>(&self, path: impl AsRef<Path>, store: Option<&S>) -> Result<ConversionReport>
    where
        S: TaxonomyStore + ?Sized,
    {
        let path = path.as_ref();
        let started_at = Utc::now();
        info!(path = %path.display(), dry_run = self.config.dry_run, "Starting eBird taxonomy conversion");

        let BuildOutput { graph, stats } = self.build(path)?;
        let mut errors = stats.errors.clone();
        let warnings = stats.warnings.clone();

        let store = match store {
            Some(_) if self.config.dry_run => {
                info!("Dry run: skipping database load");
                None
            },
            None => {
                if !self.config.dry_run {
                    warn!("No storage backend given, skipping load");
                }
                None
            },
            Some(store) => Some(store),
        };

        let load = match store {
            None => None,
            Some(store) => match store.check_table().await {
                Err(e) => {
                    let message = format!("Cannot access table '{}': {:#}", self.config.table, e);
                    warn!("{}", message);
                    errors.push(message);
                    None
                },
                Ok(()) => {
                    info!(backend = store.backend(), nodes = graph.len(), "Loading taxonomy");
                    let loader = DependencyOrderedLoader::new(self.config.batch_size, self.config.retry_policy())?
                        .with_progress(self.config.show_progress);
                    let outcome = loader.load(&graph, store).await;
                    errors.extend(outcome.errors.iter().cloned());
                    Some(LoadSummary::from(&outcome))
                },
            },
        };

        let mut report = ConversionReport {
            source: path.display().to_string(),
            started_at,
            finished_at: Utc::now(),
            dry_run: load.is_none() && self.config.dry_run,
            rank_counts: graph.rank_counts(),
            stats,
            load,
            errors,
            warnings,
        };

        if let Some(dir) = &self.config.report_dir {
            if let Err(e) = report.write_to_dir(dir) {
                let message = format!("Failed to write report to {}: {}", dir.display(), e);
                warn!("{}", message);
                report.errors.push(message);
            }
        }

        info!("Conversion finished: {}", report.summary_line());
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ebird_taxonomy::models::TaxonomyRecord;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingStore {
        inserts: AtomicUsize,
        table_ok: bool,
    }

    #[async_trait]
    impl TaxonomyStore for CountingStore {
        fn backend(&self) -> &str {
            "counting"
        }

        async fn check_table(&self) -> anyhow::Result<()> {
            if self.table_ok {
                Ok(())
            } else {
                anyhow::bail!("relation \"bird_taxonomy\" does not exist")
            }
        }

        async fn insert_batch(&self, records: &[TaxonomyRecord]) -> anyhow::Result<Vec<Uuid>> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(records.iter().map(|_| Uuid::new_v4()).collect())
        }
    }

    fn csv_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "CATEGORY,SPECIES_CODE,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP\n\
             species,amecro,American Crow,Corvus brachyrhynchos,Passeriformes,Corvidae (Crows),Crows\n\
             species,houspa,House Sparrow,Passer domesticus,Passeriformes,Passeridae (Sparrows),Sparrows\n"
        )
        .unwrap();
        file
    }

    fn store(table_ok: bool) -> CountingStore {
        CountingStore {
            inserts: AtomicUsize::new(0),
            table_ok,
        }
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_store() {
        let file = csv_file();
        let store = store(true);
        let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new().with_dry_run(true));

        let report = pipeline.run(file.path(), Some(&store)).await.unwrap();

        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
        assert!(report.dry_run);
        assert!(report.load.is_none());
        assert_eq!(report.stats.node_count, 8);
    }

    #[tokio::test]
    async fn test_loads_when_table_reachable() {
        let file = csv_file();
        let store = store(true);
        let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new());

        let report = pipeline.run(file.path(), Some(&store)).await.unwrap();

        assert_eq!(store.inserts.load(Ordering::SeqCst), 5);
        assert_eq!(report.load.as_ref().unwrap().inserted, 8);
        assert!(!report.has_errors());
    }

    #[tokio::test]
    async fn test_table_check_failure_still_reports() {
        let file = csv_file();
        let store = store(false);
        let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new());

        let report = pipeline.run(file.path(), Some(&store)).await.unwrap();

        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
        assert!(report.load.is_none());
        assert_eq!(report.stats.processed_species, 2);
        assert!(report.errors[0].starts_with("Cannot access table 'bird_taxonomy'"));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new());
        assert!(pipeline.dry_run("/nonexistent/ebird.csv").await.is_err());
    }

    #[tokio::test]
    async fn test_report_write_failure_keeps_summary() {
        let file = csv_file();
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let store = store(true);
        let pipeline = EbirdTaxonomyPipeline::new(IngestConfig::new().with_report_dir(blocker.path()));

        let report = pipeline.run(file.path(), Some(&store)).await.unwrap();

        assert_eq!(store.inserts.load(Ordering::SeqCst), 5);
        assert_eq!(report.load.as_ref().unwrap().inserted, 8);
        assert!(report.has_errors());
        assert!(report.errors.last().unwrap().starts_with("Failed to write report to"));
    }

    #[tokio::test]
    async fn test_report_written_to_dir() {
        let file = csv_file();
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            EbirdTaxonomyPipeline::new(IngestConfig::new().with_dry_run(true).with_report_dir(dir.path()));

        pipeline.dry_run(file.path()).await.unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }
}
