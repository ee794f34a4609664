// Annotation engine: spore volumes, FungalTraits lifestyles, metadata output.

pub mod spore_volume;
pub mod traits;

pub use spore_volume::add_spore_volume;
pub use traits::{add_fungal_traits, drop_duplicates};

use crate::metadata::{
    Cell, Metadata, MetadataColumn, MetadataError, MetadataValue, FEATURE_ID_HEADER,
};
use crate::reference::{self, ReferenceError, SporeTable, SporeType, TraitsTable};
use crate::taxonomy::{self, Rank, TaxonomyError, TaxonomyTable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which spore types to annotate and which ranks to fall back to after a
/// species miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationOptions {
    pub spore_types: Vec<SporeType>,
    pub fallback_ranks: Vec<Rank>,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self {
            spore_types: SporeType::ALL.to_vec(),
            fallback_ranks: vec![Rank::Genus, Rank::Family],
        }
    }
}

// ---------------------------------------------------------------------------
// Intermediate table
// ---------------------------------------------------------------------------

/// Level that produced a spore volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeSource {
    Species,
    Genus,
    Family,
    NoHit,
}

impl VolumeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeSource::Species => "species",
            VolumeSource::Genus => "genus",
            VolumeSource::Family => "family",
            VolumeSource::NoHit => "no hit",
        }
    }
}

impl From<Rank> for VolumeSource {
    fn from(rank: Rank) -> Self {
        match rank {
            Rank::Species => VolumeSource::Species,
            Rank::Genus => VolumeSource::Genus,
            Rank::Family => VolumeSource::Family,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SporeVolume {
    pub volume: Option<f64>,
    pub source: VolumeSource,
}

impl SporeVolume {
    pub fn no_hit() -> Self {
        Self {
            volume: None,
            source: VolumeSource::NoHit,
        }
    }
}

/// One output row before conversion to metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFeature {
    pub feature_id: String,
    pub genus: Option<String>,
    /// Aligned with `AnnotatedTable::spore_types`.
    pub spore_volumes: Vec<SporeVolume>,
    /// Aligned with `AnnotatedTable::trait_columns`.
    pub traits: Vec<Option<String>>,
    pub trait_match: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedTable {
    pub spore_types: Vec<SporeType>,
    pub has_genus: bool,
    pub trait_columns: Vec<String>,
    pub features: Vec<AnnotatedFeature>,
}

impl AnnotatedTable {
    /// Output columns: genus (when the taxonomy has it), a volume and an
    /// information column per spore type, then the trait columns.
    pub fn metadata_columns(&self) -> Vec<MetadataColumn> {
        let mut columns = Vec::new();
        if self.has_genus {
            columns.push(MetadataColumn::categorical(Rank::Genus.as_str()));
        }
        for spore_type in &self.spore_types {
            columns.push(MetadataColumn::numeric(spore_type.volume_column()));
            columns.push(MetadataColumn::categorical(spore_type.information_column()));
        }
        columns.extend(self.trait_columns.iter().cloned().map(MetadataColumn::categorical));
        columns
    }

    /// Convert into a QIIME 2 metadata table indexed by `feature-id`.
    pub fn into_metadata(self) -> Result<Metadata, MetadataError> {
        let mut metadata = Metadata::new(FEATURE_ID_HEADER, self.metadata_columns())?;
        for feature in self.features {
            let mut cells: Vec<Cell> = Vec::new();
            if self.has_genus {
                cells.push(feature.genus.map(MetadataValue::Categorical));
            }
            for spore in &feature.spore_volumes {
                cells.push(spore.volume.map(MetadataValue::Numeric));
                cells.push(Some(MetadataValue::Categorical(spore.source.as_str().into())));
            }
            cells.extend(
                feature
                    .traits
                    .into_iter()
                    .map(|t| t.map(MetadataValue::Categorical)),
            );
            metadata.push_row(feature.feature_id, cells)?;
        }
        Ok(metadata)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Hit counts for one spore type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SporeTypeSummary {
    pub spore_type: String,
    pub species: usize,
    pub genus: usize,
    pub family: usize,
    pub no_hit: usize,
}

/// Counts reported after an annotation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub features: usize,
    pub trait_hits: usize,
    pub duplicates_dropped: usize,
    pub spore_types: Vec<SporeTypeSummary>,
}

impl AnnotationSummary {
    fn from_table(table: &AnnotatedTable, duplicates_dropped: usize) -> Self {
        let spore_types = table
            .spore_types
            .iter()
            .enumerate()
            .map(|(i, spore_type)| {
                let mut summary = SporeTypeSummary {
                    spore_type: spore_type.to_string(),
                    ..Default::default()
                };
                for feature in &table.features {
                    match feature.spore_volumes[i].source {
                        VolumeSource::Species => summary.species += 1,
                        VolumeSource::Genus => summary.genus += 1,
                        VolumeSource::Family => summary.family += 1,
                        VolumeSource::NoHit => summary.no_hit += 1,
                    }
                }
                summary
            })
            .collect();

        Self {
            features: table.features.len(),
            trait_hits: table.features.iter().filter(|f| f.trait_match).count(),
            duplicates_dropped,
            spore_types,
        }
    }

    /// Emit the summary through tracing.
    pub fn log(&self) {
        info!(
            "Annotated {} features, {} with FungalTraits hits ({} duplicate rows dropped)",
            self.features, self.trait_hits, self.duplicates_dropped
        );
        for s in &self.spore_types {
            info!(
                "{}: {} species, {} genus, {} family, {} no hit",
                s.spore_type, s.species, s.genus, s.family, s.no_hit
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("failed to build metadata: {0}")]
    Metadata(#[from] MetadataError),
}

/// Result of the `annotate` action.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub metadata: Metadata,
    pub summary: AnnotationSummary,
}

/// Input files for `annotate_paths`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatePaths {
    pub taxonomy: PathBuf,
    pub fungal_traits: PathBuf,
    pub spore_data: PathBuf,
}

/// Annotate a loaded taxonomy with spore volumes and FungalTraits lifestyles.
pub fn annotate(
    taxonomy: &TaxonomyTable,
    spores: &SporeTable,
    traits: &TraitsTable,
    options: &AnnotationOptions,
) -> Result<Annotation, MetadataError> {
    let with_spores = add_spore_volume(taxonomy, spores, options);
    let joined = add_fungal_traits(with_spores, traits);
    let joined_rows = joined.features.len();
    let table = drop_duplicates(joined);

    let summary = AnnotationSummary::from_table(&table, joined_rows - table.features.len());
    let metadata = table.into_metadata()?;
    Ok(Annotation { metadata, summary })
}

/// Load every input from disk, then run `annotate`.
pub fn annotate_paths(
    paths: &AnnotatePaths,
    options: &AnnotationOptions,
) -> Result<Annotation, AnnotateError> {
    let taxonomy = taxonomy::load_taxonomy(&paths.taxonomy)?;
    info!(
        "Loaded {} features with ranks {:?} from {}",
        taxonomy.len(),
        taxonomy.ranks(),
        paths.taxonomy.display()
    );

    let spores = reference::load_spore_data(&paths.spore_data)?;
    info!("Loaded {} spore measurements", spores.len());

    let traits = reference::load_fungal_traits(&paths.fungal_traits)?;
    info!(
        "Loaded {} FungalTraits rows covering {} genera",
        traits.len(),
        traits.genus_count()
    );

    let annotation = annotate(&taxonomy, &spores, &traits, options)?;
    annotation.summary.log();
    Ok(annotation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
