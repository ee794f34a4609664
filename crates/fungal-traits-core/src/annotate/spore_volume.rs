// Spore volume annotation with rank fallback.
//
// Species hits use the measured volume. Genus and family fallbacks use the
// geometric mean of every measurement in that taxon, computed as
// 10^(mean of log10 volumes).

use super::{AnnotatedFeature, AnnotatedTable, AnnotationOptions, SporeVolume, VolumeSource};
use crate::reference::{SporeRecord, SporeTable, SporeType};
use crate::taxonomy::{Rank, TaxonomyRecord, TaxonomyTable};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Per-taxon aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LogAccumulator {
    sum_log10: f64,
    count: usize,
    first_volume: f64,
}

impl LogAccumulator {
    fn new(record: &SporeRecord) -> Self {
        Self {
            sum_log10: record.log10_volume,
            count: 1,
            first_volume: record.volume,
        }
    }

    fn add(&mut self, record: &SporeRecord) {
        self.sum_log10 += record.log10_volume;
        self.count += 1;
    }

    fn geometric_mean(&self) -> f64 {
        10f64.powf(self.sum_log10 / self.count as f64)
    }

    /// A single measurement is reported as-is; several are averaged.
    fn exact_or_mean(&self) -> f64 {
        if self.count == 1 {
            self.first_volume
        } else {
            self.geometric_mean()
        }
    }
}

/// Volume lookup for one spore type at one rank.
#[derive(Debug, Default)]
struct RankIndex<'a> {
    taxa: HashMap<&'a str, LogAccumulator>,
}

impl<'a> RankIndex<'a> {
    fn build(records: &[&'a SporeRecord], rank: Rank) -> Self {
        let mut taxa: HashMap<&'a str, LogAccumulator> = HashMap::new();
        for &record in records {
            let Some(taxon) = record.rank(rank) else {
                continue;
            };
            taxa.entry(taxon)
                .and_modify(|acc| acc.add(record))
                .or_insert_with(|| LogAccumulator::new(record));
        }
        Self { taxa }
    }

    fn volume(&self, taxon: &str, rank: Rank) -> Option<f64> {
        let acc = self.taxa.get(taxon)?;
        Some(match rank {
            Rank::Species => acc.exact_or_mean(),
            Rank::Genus | Rank::Family => acc.geometric_mean(),
        })
    }
}

/// Lookup order for one spore type: species first, then the fallback ranks
/// the taxonomy actually has.
fn resolution_order(taxonomy: &TaxonomyTable, options: &AnnotationOptions) -> Vec<Rank> {
    let mut order = Vec::new();
    if taxonomy.has_rank(Rank::Species) {
        order.push(Rank::Species);
    }
    for rank in &options.fallback_ranks {
        if *rank != Rank::Species && taxonomy.has_rank(*rank) && !order.contains(rank) {
            order.push(*rank);
        }
    }
    order
}

fn resolve(
    feature: &TaxonomyRecord,
    indexes: &[(Rank, RankIndex<'_>)],
) -> SporeVolume {
    for (rank, index) in indexes {
        let Some(taxon) = feature.rank(*rank) else {
            continue;
        };
        if let Some(volume) = index.volume(taxon, *rank) {
            return SporeVolume {
                volume: Some(volume),
                source: VolumeSource::from(*rank),
            };
        }
    }
    SporeVolume::no_hit()
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Add one volume/information pair per configured spore type to every
/// feature. Family and species are dropped from the result; genus is kept
/// for the trait join.
pub fn add_spore_volume(
    taxonomy: &TaxonomyTable,
    spores: &SporeTable,
    options: &AnnotationOptions,
) -> AnnotatedTable {
    let order = resolution_order(taxonomy, options);

    let per_type: Vec<(SporeType, Vec<(Rank, RankIndex<'_>)>)> = options
        .spore_types
        .iter()
        .map(|&spore_type| {
            let records: Vec<&SporeRecord> = spores.of_type(spore_type).collect();
            let indexes = order
                .iter()
                .map(|&rank| (rank, RankIndex::build(&records, rank)))
                .collect();
            (spore_type, indexes)
        })
        .collect();

    let features = taxonomy
        .records()
        .iter()
        .map(|record| AnnotatedFeature {
            feature_id: record.feature_id.clone(),
            genus: record.genus.clone(),
            spore_volumes: per_type
                .iter()
                .map(|(_, indexes)| resolve(record, indexes))
                .collect(),
            traits: Vec::new(),
            trait_match: false,
        })
        .collect();

    AnnotatedTable {
        spore_types: options.spore_types.clone(),
        has_genus: taxonomy.has_rank(Rank::Genus),
        trait_columns: Vec::new(),
        features,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
