//! Errors raised while building and loading the taxonomy

use thiserror::Error;

use super::models::{NodeKey, Rank};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("{} name cannot be empty", .0.label())]
    EmptyName(Rank),

    #[error("Could not extract valid family name from: {0}")]
    UnparseableFamily(String),

    #[error("Family '{family}' already belongs to order '{existing_order}', refusing '{order}'")]
    FamilyConflict {
        family: String,
        existing_order: String,
        order: String,
    },

    #[error("Parent '{parent_key}' of '{key}' has no storage identifier")]
    UnresolvedParent { key: NodeKey, parent_key: NodeKey },

    #[error("'{key}' held back: {rank} batch {batch_number} has unresolved parents")]
    HeldBack {
        key: NodeKey,
        rank: Rank,
        batch_number: usize,
    },

    #[error("Storage returned no identifier for '{0}'")]
    MissingIdentifier(NodeKey),
}
