//! Shared fixtures for aviatlas-ingest integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use aviatlas_ingest::ebird_taxonomy::{
    FamilyConflictPolicy, HierarchyBuilder, SourceRow, TaxonomyGraph, TaxonomyRecord, TaxonomyStore,
};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

pub const HEADER: &str =
    "TAXON_ORDER,CATEGORY,SPECIES_CODE,TAXON_CONCEPT_ID,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP,REPORT_AS";

/// Two crows and a sparrow: 1 class, 1 order, 2 families, 2 genera, 3 species
pub const THREE_ROWS: &str = "\
21342,species,amecro,avibase-69544B59,American Crow,Corvus brachyrhynchos,Passeriformes,\"Corvidae (Crows, Jays, and Magpies)\",\"Jays, Magpies, Crows, and Ravens\",
21383,species,comrav,avibase-0B7F0E0D,Common Raven,Corvus corax,Passeriformes,\"Corvidae (Crows, Jays, and Magpies)\",\"Jays, Magpies, Crows, and Ravens\",
31187,species,houspa,avibase-6E8B3C4B,House Sparrow,Passer domesticus,Passeriformes,Passeridae (Old World Sparrows),Old World Sparrows,
";

pub fn species_row(code: &str, common: &str, sci: &str, order: &str, family: &str) -> SourceRow {
    SourceRow {
        category: "species".to_string(),
        species_code: code.to_string(),
        primary_com_name: common.to_string(),
        sci_name: sci.to_string(),
        order: order.to_string(),
        family: family.to_string(),
        species_group: "Test group".to_string(),
        ..SourceRow::default()
    }
}

pub fn three_row_graph() -> TaxonomyGraph {
    let mut builder = HierarchyBuilder::new(FamilyConflictPolicy::Warn).unwrap();
    builder.ingest(
        1,
        &species_row("amecro", "American Crow", "Corvus brachyrhynchos", "Passeriformes", "Corvidae (Crows, Jays, and Magpies)"),
    );
    builder.ingest(
        2,
        &species_row("comrav", "Common Raven", "Corvus corax", "Passeriformes", "Corvidae (Crows, Jays, and Magpies)"),
    );
    builder.ingest(
        3,
        &species_row("houspa", "House Sparrow", "Passer domesticus", "Passeriformes", "Passeridae (Old World Sparrows)"),
    );
    builder.finish().graph
}

/// Write a taxonomy CSV with the standard header into a fresh temp dir
pub fn write_csv(body: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eBird_taxonomy.csv");
    std::fs::write(&path, format!("{}\n{}", HEADER, body)).unwrap();
    (dir, path)
}

/// In-memory store that hands out fresh ids and remembers what it stored
#[derive(Default)]
pub struct EchoStore {
    pub stored: Mutex<Vec<(Uuid, TaxonomyRecord)>>,
    pub calls: Mutex<Vec<Vec<String>>>,
    /// Any batch containing a record with this name fails every time
    pub fail_on_name: Option<String>,
}

impl EchoStore {
    pub fn failing_on(name: &str) -> Self {
        Self {
            fail_on_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn record(&self, id: Uuid) -> Option<TaxonomyRecord> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .find(|(stored_id, _)| *stored_id == id)
            .map(|(_, record)| record.clone())
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.stored.lock().unwrap().iter().map(|(_, r)| r.name.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TaxonomyStore for EchoStore {
    fn backend(&self) -> &str {
        "echo"
    }

    async fn insert_batch(&self, records: &[TaxonomyRecord]) -> anyhow::Result<Vec<Uuid>> {
        self.calls
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.name.clone()).collect());

        if let Some(name) = &self.fail_on_name {
            if records.iter().any(|r| &r.name == name) {
                anyhow::bail!("connection reset while inserting '{}'", name);
            }
        }

        let mut stored = self.stored.lock().unwrap();
        Ok(records
            .iter()
            .map(|record| {
                let id = Uuid::new_v4();
                stored.push((id, record.clone()));
                id
            })
            .collect())
    }
}

/// Mock PostgREST insert: one fresh id per submitted record
pub struct EchoIds;

impl Respond for EchoIds {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let records: Vec<serde_json::Value> = serde_json::from_slice(&request.body).unwrap();
        let rows: Vec<_> = records
            .iter()
            .map(|_| serde_json::json!({ "id": Uuid::new_v4() }))
            .collect();
        ResponseTemplate::new(201).set_body_json(rows)
    }
}
