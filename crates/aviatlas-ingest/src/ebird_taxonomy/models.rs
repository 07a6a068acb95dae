//! eBird taxonomy data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Taxonomic rank of a node in the bird hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// Ranks in the order they must be persisted (parents before children)
    pub const INSERTION_ORDER: [Rank; 5] =
        [Rank::Class, Rank::Order, Rank::Family, Rank::Genus, Rank::Species];

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }

    /// Capitalised label used in reports
    pub fn label(self) -> &'static str {
        match self {
            Rank::Class => "Class",
            Rank::Order => "Order",
            Rank::Family => "Family",
            Rank::Genus => "Genus",
            Rank::Species => "Species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical in-memory identity of a node (e.g. `family_corvidae`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Provenance carried on a node
///
/// Only the fields the converter actually produces exist here; source
/// columns without a slot are dropped when the row is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Free-text description (root class only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Import that created the node (orders)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_from: Option<String>,
    /// Raw family string including its parenthetical gloss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// eBird `TAXON_ORDER` sort hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxon_order: Option<String>,
    /// eBird `CATEGORY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// eBird `REPORT_AS` cross-reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_as: Option<String>,
}

/// A node of the hierarchy under construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub key: NodeKey,
    pub name: String,
    pub rank: Rank,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    /// Canonical key of the parent; `None` only for the class root
    pub parent_key: Option<NodeKey>,
    /// eBird species code (species only)
    pub external_code: Option<String>,
    pub order_name: Option<String>,
    pub family_name: Option<String>,
    pub species_group: Option<String>,
    pub metadata: NodeMetadata,
}

/// One row of the eBird taxonomy CSV
///
/// Columns not named here (e.g. `TAXON_CONCEPT_ID`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    #[serde(rename = "TAXON_ORDER", default)]
    pub taxon_order: String,
    #[serde(rename = "CATEGORY", default)]
    pub category: String,
    #[serde(rename = "SPECIES_CODE", default)]
    pub species_code: String,
    #[serde(rename = "PRIMARY_COM_NAME", default)]
    pub primary_com_name: String,
    #[serde(rename = "SCI_NAME", default)]
    pub sci_name: String,
    #[serde(rename = "ORDER", default)]
    pub order: String,
    #[serde(rename = "FAMILY", default)]
    pub family: String,
    #[serde(rename = "SPECIES_GROUP", default)]
    pub species_group: String,
    #[serde(rename = "REPORT_AS", default)]
    pub report_as: String,
}

impl SourceRow {
    /// Header columns a taxonomy file must provide
    pub const REQUIRED_COLUMNS: [&'static str; 7] = [
        "CATEGORY",
        "SPECIES_CODE",
        "PRIMARY_COM_NAME",
        "SCI_NAME",
        "ORDER",
        "FAMILY",
        "SPECIES_GROUP",
    ];
}

/// Row shape written to the `bird_taxonomy` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub name: String,
    pub rank: Rank,
    pub parent_id: Option<Uuid>,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub ebird_code: Option<String>,
    pub order_name: Option<String>,
    pub family_name: Option<String>,
    pub species_group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxonomyRecord {
    pub fn from_node(node: &TaxonomyNode, parent_id: Option<Uuid>, at: DateTime<Utc>) -> Self {
        Self {
            name: node.name.clone(),
            rank: node.rank,
            parent_id,
            scientific_name: node.scientific_name.clone(),
            common_name: node.common_name.clone(),
            ebird_code: node.external_code.clone(),
            order_name: node.order_name.clone(),
            family_name: node.family_name.clone(),
            species_group: node.species_group.clone(),
            created_at: at,
            updated_at: at,
        }
    }
}
