// FungalTraits join on genus and per-feature de-duplication.

use super::{AnnotatedFeature, AnnotatedTable};
use crate::reference::traits::{TraitRow, TraitsTable};
use std::collections::HashSet;
use tracing::warn;

/// Left-join features against the FungalTraits table on genus.
///
/// Features without a genus, or with a genus the table does not know, get
/// missing trait values. A genus listed several times yields one row per
/// reference entry; `drop_duplicates` collapses them afterwards.
pub fn add_fungal_traits(table: AnnotatedTable, traits: &TraitsTable) -> AnnotatedTable {
    let width = traits.columns().len();
    let mut features = Vec::with_capacity(table.features.len());

    for feature in table.features {
        let matches: &[TraitRow] = match (table.has_genus, feature.genus.as_deref()) {
            (true, Some(genus)) => traits.lookup(genus),
            _ => &[],
        };
        if matches.is_empty() {
            features.push(AnnotatedFeature {
                traits: vec![None; width],
                trait_match: false,
                ..feature
            });
            continue;
        }
        for values in matches {
            features.push(AnnotatedFeature {
                traits: values.clone(),
                trait_match: true,
                ..feature.clone()
            });
        }
    }

    AnnotatedTable {
        trait_columns: traits.columns().to_vec(),
        features,
        ..table
    }
}

/// Keep the first row for every feature id, preserving order.
pub fn drop_duplicates(table: AnnotatedTable) -> AnnotatedTable {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<AnnotatedFeature> = Vec::with_capacity(table.features.len());

    for feature in table.features {
        if seen.insert(feature.feature_id.clone()) {
            kept.push(feature);
            continue;
        }
        let differs = kept
            .iter()
            .rev()
            .find(|k| k.feature_id == feature.feature_id)
            .is_some_and(|k| *k != feature);
        if differs {
            warn!(
                "feature '{}' matched several differing FungalTraits rows, keeping the first",
                feature.feature_id
            );
        }
    }

    AnnotatedTable {
        features: kept,
        ..table
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
