//! eBird taxonomy CSV reader

use csv::{DeserializeRecordsIntoIter, ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use aviatlas_common::{AviatlasError, Result};

use super::models::SourceRow;

/// Yields `(row_number, SourceRow)` pairs in file order
///
/// The header is checked when the reader is created. A record that cannot be
/// decoded surfaces as an error from the iterator; callers treat it as fatal.
pub struct TaxonomyCsvReader<R: Read> {
    records: DeserializeRecordsIntoIter<R, SourceRow>,
    row_number: usize,
}

impl TaxonomyCsvReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening taxonomy CSV");
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read> TaxonomyCsvReader<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        check_headers(&headers)?;
        debug!(columns = headers.len(), "Taxonomy CSV header accepted");

        Ok(Self {
            records: csv_reader.into_deserialize(),
            row_number: 0,
        })
    }
}

fn check_headers(headers: &StringRecord) -> Result<()> {
    let missing: Vec<String> = SourceRow::REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AviatlasError::MissingColumns(missing))
    }
}

impl<R: Read> Iterator for TaxonomyCsvReader<R> {
    type Item = Result<(usize, SourceRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row_number += 1;
        Some(record.map(|row| (self.row_number, row)).map_err(AviatlasError::from))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "TAXON_ORDER,CATEGORY,SPECIES_CODE,TAXON_CONCEPT_ID,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP,REPORT_AS";

    #[test]
    fn test_reads_rows_with_numbers() {
        let data = format!(
            "{}\n1,species,ostric2,avibase-1,Common Ostrich,Struthio camelus,Struthioniformes,Struthionidae (Ostriches),Ostriches,\n\
             2,species,ostric3,avibase-2,Somali Ostrich,Struthio molybdophanes,Struthioniformes,Struthionidae (Ostriches),Ostriches,\n",
            HEADER
        );

        let rows: Vec<_> = TaxonomyCsvReader::from_reader(data.as_bytes())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[1].0, 2);
        assert_eq!(rows[0].1.family, "Struthionidae (Ostriches)");
        assert_eq!(rows[1].1.sci_name, "Struthio molybdophanes");
        assert_eq!(rows[0].1.report_as, "");
    }

    #[test]
    fn test_optional_columns_may_be_absent() {
        let data = "CATEGORY,SPECIES_CODE,PRIMARY_COM_NAME,SCI_NAME,ORDER,FAMILY,SPECIES_GROUP\n\
                    species,amecro,American Crow,Corvus brachyrhynchos,Passeriformes,Corvidae,Crows\n";

        let (number, row) = TaxonomyCsvReader::from_reader(data.as_bytes())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(number, 1);
        assert_eq!(row.taxon_order, "");
        assert_eq!(row.species_code, "amecro");
    }

    #[test]
    fn test_missing_columns_listed() {
        let data = "CATEGORY,SPECIES_CODE,PRIMARY_COM_NAME,ORDER\nspecies,amecro,American Crow,Passeriformes\n";

        let err = TaxonomyCsvReader::from_reader(data.as_bytes()).err().unwrap();
        match err {
            AviatlasError::MissingColumns(columns) => {
                assert_eq!(columns, vec!["SCI_NAME", "FAMILY", "SPECIES_GROUP"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_record_is_an_error() {
        let data = format!("{}\n1,species,amecro\n", HEADER);
        let mut reader = TaxonomyCsvReader::from_reader(data.as_bytes()).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.is_source_failure());
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(
            file,
            "3,species,amecro,avibase-3,American Crow,Corvus brachyrhynchos,Passeriformes,Corvidae (Crows),Crows,"
        )
        .unwrap();

        let rows: Vec<_> = TaxonomyCsvReader::open(file.path()).unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert!(TaxonomyCsvReader::open("/nonexistent/taxonomy.csv").is_err());
    }
}
