//! Read-only quality audit of a taxonomy CSV
//!
//! Runs the same checks the converter relies on, without building a tree,
//! so a new taxonomy release can be reviewed before it is imported.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::reader::TaxonomyCsvReader;
use super::validation::RowValidator;

/// Fields whose blanks are counted per column
const ESSENTIAL_FIELDS: [&str; 3] = ["SPECIES_CODE", "PRIMARY_COM_NAME", "SCI_NAME"];

const PROGRESS_INTERVAL: usize = 5000;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CsvAudit {
    pub total_rows: usize,
    pub species_count: usize,
    pub categories: BTreeMap<String, usize>,
    pub orders: BTreeSet<String>,
    pub families: BTreeSet<String>,
    /// Blank count per essential field
    pub missing_data: BTreeMap<String, usize>,
    pub duplicate_codes: Vec<String>,
    pub invalid_scientific_names: Vec<String>,
    /// Families (species rows only) listed under more than one order
    pub family_order_conflicts: BTreeMap<String, BTreeSet<String>>,
}

impl CsvAudit {
    /// No duplicates, no bad names, no blanks, no conflicting families
    pub fn is_clean(&self) -> bool {
        self.duplicate_codes.is_empty()
            && self.invalid_scientific_names.is_empty()
            && self.missing_data.values().all(|&n| n == 0)
            && self.family_order_conflicts.is_empty()
    }
}

pub fn audit_path(path: impl AsRef<Path>) -> Result<CsvAudit> {
    let path = path.as_ref();
    let reader = TaxonomyCsvReader::open(path)
        .with_context(|| format!("Failed to open taxonomy CSV {}", path.display()))?;
    audit(reader)
}

pub fn audit<R: Read>(reader: TaxonomyCsvReader<R>) -> Result<CsvAudit> {
    let validator = RowValidator::new()?;
    let mut result = CsvAudit {
        missing_data: ESSENTIAL_FIELDS.iter().map(|f| (f.to_string(), 0)).collect(),
        ..CsvAudit::default()
    };
    let mut seen_codes = HashSet::new();
    let mut family_orders: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for item in reader {
        let (row_number, row) = item.context("Failed to read taxonomy row")?;
        result.total_rows += 1;

        *result.categories.entry(row.category.trim().to_string()).or_default() += 1;
        let is_species = row.category.trim() == "species";
        if is_species {
            result.species_count += 1;
        }

        for (field, value) in ESSENTIAL_FIELDS
            .iter()
            .zip([&row.species_code, &row.primary_com_name, &row.sci_name])
        {
            if value.trim().is_empty() {
                *result.missing_data.entry(field.to_string()).or_default() += 1;
            }
        }

        let code = row.species_code.trim();
        if !code.is_empty() && !seen_codes.insert(code.to_string()) {
            result.duplicate_codes.push(code.to_string());
        }

        let sci_name = row.sci_name.trim();
        if !sci_name.is_empty() && !validator.is_valid_scientific_name(sci_name) {
            result.invalid_scientific_names.push(sci_name.to_string());
        }

        let order = row.order.trim();
        let family = row.family.trim();
        if !order.is_empty() {
            result.orders.insert(order.to_string());
        }
        if !family.is_empty() {
            result.families.insert(family.to_string());
        }
        if is_species && !order.is_empty() && !family.is_empty() {
            family_orders
                .entry(family.to_string())
                .or_default()
                .insert(order.to_string());
        }

        if row_number % PROGRESS_INTERVAL == 0 {
            debug!("Audited {} rows...", row_number);
        }
    }

    result.family_order_conflicts = family_orders
        .into_iter()
        .filter(|(_, orders)| orders.len() > 1)
        .collect();

    info!(
        rows = result.total_rows,
        species = result.species_count,
        clean = result.is_clean(),
        "CSV audit finished"
    );
    Ok(result)
}

impl fmt::Display for CsvAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CSV VALIDATION")?;
        writeln!(f, "  Total rows: {}", self.total_rows)?;
        writeln!(f, "  Species rows: {}", self.species_count)?;
        writeln!(f, "  Orders: {}", self.orders.len())?;
        writeln!(f, "  Families: {}", self.families.len())?;

        writeln!(f, "  Categories:")?;
        for (category, count) in &self.categories {
            writeln!(f, "    {}: {}", category, count)?;
        }

        writeln!(f, "  Missing data:")?;
        for (field, count) in &self.missing_data {
            writeln!(f, "    {}: {}", field, count)?;
        }

        writeln!(f, "  Duplicate species codes: {}", self.duplicate_codes.len())?;
        for code in self.duplicate_codes.iter().take(10) {
            writeln!(f, "    - {}", code)?;
        }

        writeln!(f, "  Invalid scientific names: {}", self.invalid_scientific_names.len())?;
        for name in self.invalid_scientific_names.iter().take(10) {
            writeln!(f, "    - {}", name)?;
        }

        write!(f, "  Families in multiple orders: {}", self.family_order_conflicts.len())?;
        for (family, orders) in &self.family_order_conflicts {
            let orders: Vec<&str> = orders.iter().map(String::as_str).collect();
            write!(f, "\n    - {}: {}", family, orders.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CSV: &str = "\
TAXON_ORDER,CATEGORY,SPECIES_CODE,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP,REPORT_AS
1,species,amecro,American Crow,Corvus brachyrhynchos,Passeriformes,Corvidae,Crows,
2,species,comrav,Common Raven,Corvus corax,Passeriformes,Corvidae,Crows,
3,slash,y00001,crow/raven sp.,Corvus brachyrhynchos/corax,Passeriformes,Corvidae,Crows,
4,species,amecro,American Crow,Corvus brachyrhynchos,Passeriformes,Corvidae,Crows,
5,species,oddbir,Odd Bird,oddus birdus,Corviformes,Corvidae,Crows,
6,species,,Nameless,Passer domesticus,Passeriformes,Passeridae,Sparrows,
";

    #[test]
    fn test_audit_counts() {
        let audit = audit(TaxonomyCsvReader::from_reader(CSV.as_bytes()).unwrap()).unwrap();

        assert_eq!(audit.total_rows, 6);
        assert_eq!(audit.species_count, 5);
        assert_eq!(audit.categories["slash"], 1);
        assert_eq!(audit.orders.len(), 2);
        assert_eq!(audit.families.len(), 2);
        assert_eq!(audit.missing_data["SPECIES_CODE"], 1);
        assert_eq!(audit.missing_data["SCI_NAME"], 0);
        assert_eq!(audit.duplicate_codes, vec!["amecro"]);
        assert_eq!(audit.invalid_scientific_names, vec!["oddus birdus"]);
        assert!(!audit.is_clean());
    }

    #[test]
    fn test_family_in_two_orders() {
        let audit = audit(TaxonomyCsvReader::from_reader(CSV.as_bytes()).unwrap()).unwrap();

        let orders = &audit.family_order_conflicts["Corvidae"];
        assert_eq!(orders.iter().collect::<Vec<_>>(), vec!["Corviformes", "Passeriformes"]);
        assert!(!audit.family_order_conflicts.contains_key("Passeridae"));
        assert!(audit.to_string().contains("Corvidae: Corviformes, Passeriformes"));
    }

    #[test]
    fn test_clean_file() {
        let csv = "\
CATEGORY,SPECIES_CODE,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP
species,houspa,House Sparrow,Passer domesticus,Passeriformes,Passeridae,Sparrows
";
        let audit = audit(TaxonomyCsvReader::from_reader(csv.as_bytes()).unwrap()).unwrap();
        assert!(audit.is_clean());
    }
}
