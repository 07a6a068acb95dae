//! Canonical node keys and name cleanup
//!
//! Keys deduplicate nodes before they reach storage: any two names that
//! canonicalize to the same key are the same node.
//!
//! | rank    | input                         | key                     |
//! |---------|-------------------------------|-------------------------|
//! | class   | -                             | `class_aves`            |
//! | order   | `"Passeriformes "`            | `order_passeriformes`   |
//! | family  | `"Struthionidae (Ostriches)"` | `family_struthionidae`  |
//! | genus   | `"Corvus"`                    | `genus_corvus`          |
//! | species | `"amecro"`                    | `species_amecro`        |

use super::error::TaxonomyError;
use super::models::{NodeKey, Rank};

/// Key of the single root node
pub const ROOT_KEY: &str = "class_aves";

pub fn class_key() -> NodeKey {
    NodeKey::new(ROOT_KEY)
}

/// Lower-case and join words with underscores
fn slug(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

pub fn order_key(order_name: &str) -> Result<NodeKey, TaxonomyError> {
    let name = order_name.trim();
    if name.is_empty() {
        return Err(TaxonomyError::EmptyName(Rank::Order));
    }
    Ok(NodeKey::new(format!("order_{}", slug(name))))
}

/// Strip the parenthetical gloss from an eBird family string
///
/// `"Struthionidae (Ostriches)"` becomes `"Struthionidae"`. Internal
/// whitespace runs collapse to one space.
pub fn clean_family_name(family: &str) -> String {
    let before_gloss = family.split('(').next().unwrap_or_default();
    before_gloss.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key and cleaned display name for a raw family string
pub fn family_key(family: &str) -> Result<(NodeKey, String), TaxonomyError> {
    if family.trim().is_empty() {
        return Err(TaxonomyError::EmptyName(Rank::Family));
    }
    let cleaned = clean_family_name(family);
    if cleaned.is_empty() {
        return Err(TaxonomyError::UnparseableFamily(family.to_string()));
    }
    let key = NodeKey::new(format!("family_{}", slug(&cleaned)));
    Ok((key, cleaned))
}

pub fn genus_key(genus: &str) -> Result<NodeKey, TaxonomyError> {
    let name = genus.trim();
    if name.is_empty() {
        return Err(TaxonomyError::EmptyName(Rank::Genus));
    }
    Ok(NodeKey::new(format!("genus_{}", name.to_lowercase().replace(' ', "_"))))
}

/// Species are keyed by their eBird code, never normalized
pub fn species_key(code: &str) -> NodeKey {
    NodeKey::new(format!("species_{}", code))
}

/// Genus token of a scientific name, if one can be attributed safely
///
/// Hybrids (`" x "`), slashes and bracketed groups have no single genus.
pub fn extract_genus(scientific_name: &str) -> Option<&str> {
    let name = scientific_name.trim();
    if name.is_empty() {
        return None;
    }
    if scientific_name.contains(" x ") || name.contains('/') || name.contains('[') {
        return None;
    }
    name.split_whitespace()
        .next()
        .filter(|token| token.chars().all(char::is_alphabetic))
}
