//! Conversion summary report

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use aviatlas_common::Result;

use super::hierarchy::BuildStats;
use super::loader::LoadOutcome;
use super::models::Rank;

/// Errors listed in the text rendering before truncation
pub const MAX_LISTED_ERRORS: usize = 10;

/// Warnings listed in the text rendering before truncation
pub const MAX_LISTED_WARNINGS: usize = 5;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub batches_submitted: usize,
    pub batches_succeeded: usize,
    pub inserted: usize,
    pub failed_batches: usize,
    pub unresolved_nodes: usize,
}

impl From<&LoadOutcome> for LoadSummary {
    fn from(outcome: &LoadOutcome) -> Self {
        Self {
            batches_submitted: outcome.batches_submitted,
            batches_succeeded: outcome.batches_succeeded,
            inserted: outcome.inserted,
            failed_batches: outcome.failures.len(),
            unresolved_nodes: outcome.unresolved.len(),
        }
    }
}

/// Everything known about one conversion run
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub stats: BuildStats,
    pub rank_counts: BTreeMap<Rank, usize>,
    pub load: Option<LoadSummary>,
    /// Build, access-check and load errors, in the order they happened
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConversionReport {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// One line for logs and the CLI
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} rows, {} species, {} nodes",
            self.stats.total_rows, self.stats.processed_species, self.stats.node_count
        );
        match &self.load {
            Some(load) => line.push_str(&format!(", {} inserted", load.inserted)),
            None if self.dry_run => line.push_str(" (dry run)"),
            None => line.push_str(", not loaded"),
        }
        line.push_str(&format!(", {} errors, {} warnings", self.errors.len(), self.warnings.len()));
        line
    }

    pub fn file_name(&self) -> String {
        format!("conversion_report_{}.txt", self.finished_at.format("%Y%m%d_%H%M%S"))
    }

    /// Write the text rendering into `dir`, returning the file path
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_string())?;
        info!(path = %path.display(), "Report saved");
        Ok(path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 1234567 -> "1,234,567"
fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn write_truncated(f: &mut fmt::Formatter<'_>, title: &str, items: &[String], limit: usize) -> fmt::Result {
    writeln!(f, "{}: {}", title, items.len())?;
    for item in items.iter().take(limit) {
        writeln!(f, "  - {}", item)?;
    }
    if items.len() > limit {
        writeln!(f, "  ... and {} more", items.len() - limit)?;
    }
    Ok(())
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "EBIRD TAXONOMY CONVERSION SUMMARY")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Start time: {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "End time: {}", self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Duration: {:.2} seconds", self.duration_secs())?;
        if self.dry_run {
            writeln!(f, "Mode: dry run (nothing written)")?;
        }
        writeln!(f)?;

        writeln!(f, "PROCESSING STATISTICS:")?;
        writeln!(f, "  Total CSV rows: {}", with_thousands(self.stats.total_rows))?;
        writeln!(f, "  Processed species: {}", with_thousands(self.stats.processed_species))?;
        writeln!(f, "  Created nodes: {}", with_thousands(self.stats.node_count))?;
        writeln!(f, "  Skipped rows: {}", with_thousands(self.stats.skipped_rows()))?;
        writeln!(f, "    invalid: {}", with_thousands(self.stats.skipped_invalid))?;
        writeln!(f, "    non-species category: {}", with_thousands(self.stats.skipped_category))?;
        writeln!(f, "  Failed rows: {}", with_thousands(self.stats.failed_rows))?;
        writeln!(f, "  Duplicate species codes: {}", with_thousands(self.stats.duplicate_species))?;
        writeln!(f)?;

        writeln!(f, "NODE BREAKDOWN:")?;
        for (rank, count) in &self.rank_counts {
            writeln!(f, "  {}: {}", rank.label(), with_thousands(*count))?;
        }
        writeln!(f)?;

        if let Some(load) = &self.load {
            writeln!(f, "LOAD STATISTICS:")?;
            writeln!(f, "  Batches submitted: {}", with_thousands(load.batches_submitted))?;
            writeln!(f, "  Batches succeeded: {}", with_thousands(load.batches_succeeded))?;
            writeln!(f, "  Records inserted: {}", with_thousands(load.inserted))?;
            writeln!(f, "  Failed batches: {}", with_thousands(load.failed_batches))?;
            writeln!(f, "  Unresolved nodes: {}", with_thousands(load.unresolved_nodes))?;
            writeln!(f)?;
        }

        write_truncated(f, "ERRORS", &self.errors, MAX_LISTED_ERRORS)?;
        writeln!(f)?;
        write_truncated(f, "WARNINGS", &self.warnings, MAX_LISTED_WARNINGS)?;
        writeln!(f)?;
        write!(f, "{}", rule)
    }
}
