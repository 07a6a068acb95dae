//! Row validation
//!
//! A [`SourceRow`] becomes a [`ValidatedRow`] only after every check passes.
//! The hierarchy builder never sees a partially-shaped row.

use regex::Regex;
use std::fmt;

use super::models::SourceRow;

/// Longest primary common name accepted, in characters
pub const MAX_COMMON_NAME_CHARS: usize = 200;

/// A source row that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub species_code: String,
    pub category: String,
    pub common_name: String,
    pub scientific_name: String,
    pub order: String,
    /// Family exactly as it appears in the source, gloss included
    pub family: String,
    pub species_group: Option<String>,
    pub taxon_order: Option<String>,
    pub report_as: Option<String>,
}

impl ValidatedRow {
    pub fn is_species(&self) -> bool {
        self.category == "species"
    }
}

/// One reason a row was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDefect {
    MissingField { row: usize, field: &'static str },
    InvalidScientificName { row: usize, value: String },
    CommonNameTooLong { row: usize, length: usize },
}

impl fmt::Display for RowDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDefect::MissingField { row, field } => write!(f, "Row {}: Missing {}", row, field),
            RowDefect::InvalidScientificName { row, value } => {
                write!(f, "Row {}: Invalid scientific name format: {}", row, value)
            },
            RowDefect::CommonNameTooLong { row, length } => {
                write!(f, "Row {}: Common name too long ({} characters)", row, length)
            },
        }
    }
}

/// Checks required fields, scientific-name shape and name lengths
#[derive(Debug, Clone)]
pub struct RowValidator {
    name_pattern: Regex,
}

impl RowValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            name_pattern: Regex::new(r"^[A-Za-z\s\-\.]+$")?,
        })
    }

    /// Validate one row, collecting every defect rather than stopping at the first
    pub fn validate(
        &self,
        row_number: usize,
        row: &SourceRow,
    ) -> Result<ValidatedRow, Vec<RowDefect>> {
        let mut defects = Vec::new();

        let required = [
            ("SPECIES_CODE", &row.species_code),
            ("PRIMARY_COM_NAME", &row.primary_com_name),
            ("SCI_NAME", &row.sci_name),
            ("ORDER", &row.order),
            ("FAMILY", &row.family),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                defects.push(RowDefect::MissingField {
                    row: row_number,
                    field,
                });
            }
        }

        let scientific_name = row.sci_name.trim();
        if !scientific_name.is_empty() && !self.is_valid_scientific_name(scientific_name) {
            defects.push(RowDefect::InvalidScientificName {
                row: row_number,
                value: scientific_name.to_string(),
            });
        }

        let length = row.primary_com_name.chars().count();
        if length > MAX_COMMON_NAME_CHARS {
            defects.push(RowDefect::CommonNameTooLong {
                row: row_number,
                length,
            });
        }

        if !defects.is_empty() {
            return Err(defects);
        }

        Ok(ValidatedRow {
            row_number,
            species_code: row.species_code.trim().to_string(),
            category: row.category.trim().to_string(),
            common_name: row.primary_com_name.trim().to_string(),
            scientific_name: scientific_name.to_string(),
            order: row.order.trim().to_string(),
            family: row.family.clone(),
            species_group: non_blank(&row.species_group),
            taxon_order: non_blank(&row.taxon_order),
            report_as: non_blank(&row.report_as),
        })
    }

    /// Binomial shape check
    ///
    /// Names with a hybrid/complex marker (`x`, `/`, `[`) are accepted as-is.
    pub fn is_valid_scientific_name(&self, name: &str) -> bool {
        if name.contains(['x', '/', '[']) {
            return true;
        }

        let Some(genus) = name.split_whitespace().next() else {
            return false;
        };
        if !genus.chars().next().is_some_and(char::is_uppercase) {
            return false;
        }

        self.name_pattern.is_match(name)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
