// Taxonomy loading for QIIME 2 FeatureData[Taxonomy] TSV files.
//
// A taxonomy row carries a feature id and a `;`-separated lineage such as
// `k__Fungi;p__Basidiomycota;...;g__Amanita;s__Amanita_muscaria`. Only the
// family, genus and species levels matter for annotation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// File name of the taxonomy inside a `TSVTaxonomyDirectoryFormat` directory.
pub const TAXONOMY_FILE_NAME: &str = "taxonomy.tsv";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Taxonomic ranks the annotation engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Family,
    Genus,
    Species,
}

impl Rank {
    /// All ranks in table column order.
    pub const ALL: [Rank; 3] = [Rank::Family, Rank::Genus, Rank::Species];

    /// Map a lineage prefix (`f`, `g`, `s`) to its rank.
    pub fn from_prefix(prefix: &str) -> Option<Rank> {
        match prefix {
            "f" => Some(Rank::Family),
            "g" => Some(Rank::Genus),
            "s" => Some(Rank::Species),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "family" => Ok(Rank::Family),
            "genus" => Ok(Rank::Genus),
            "species" => Ok(Rank::Species),
            other => Err(format!("unknown taxonomic rank '{other}'")),
        }
    }
}

/// One feature with the rank values extracted from its lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRecord {
    pub feature_id: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
}

impl TaxonomyRecord {
    pub fn new(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            family: None,
            genus: None,
            species: None,
        }
    }

    /// Builder-style setter, mostly useful in tests.
    pub fn with(mut self, rank: Rank, value: &str) -> Self {
        *self.slot_mut(rank) = Some(value.to_string());
        self
    }

    pub fn rank(&self, rank: Rank) -> Option<&str> {
        match rank {
            Rank::Family => self.family.as_deref(),
            Rank::Genus => self.genus.as_deref(),
            Rank::Species => self.species.as_deref(),
        }
    }

    fn slot_mut(&mut self, rank: Rank) -> &mut Option<String> {
        match rank {
            Rank::Family => &mut self.family,
            Rank::Genus => &mut self.genus,
            Rank::Species => &mut self.species,
        }
    }
}

/// A loaded taxonomy: the ranks present in the file and one record per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyTable {
    ranks: Vec<Rank>,
    records: Vec<TaxonomyRecord>,
}

impl TaxonomyTable {
    /// Build a table from explicit parts. Ranks are stored in column order.
    pub fn new(ranks: &[Rank], records: Vec<TaxonomyRecord>) -> Self {
        let ranks = Rank::ALL
            .into_iter()
            .filter(|r| ranks.contains(r))
            .collect();
        Self { ranks, records }
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn has_rank(&self, rank: Rank) -> bool {
        self.ranks.contains(&rank)
    }

    pub fn records(&self) -> &[TaxonomyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("taxonomy contains no features")]
    Empty,

    #[error(
        "None of the taxonomy levels \"family\", \"genus\", or \"species\" are present. \
         Please check your taxonomy file."
    )]
    MissingRanks,
}

// ---------------------------------------------------------------------------
// Raw TSV serde struct (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTaxonomyRow {
    #[serde(rename = "Feature ID", alias = "feature-id", alias = "Feature-ID", alias = "id")]
    feature_id: String,
    #[serde(rename = "Taxon")]
    taxon: String,
}

// ---------------------------------------------------------------------------
// Lineage parsing helpers
// ---------------------------------------------------------------------------

/// Prefix of a lineage level: the text before the first `__`.
fn level_prefix(level: &str) -> &str {
    level.split("__").next().unwrap_or_default().trim()
}

/// Value of a lineage level: the text after the last `__`. Empty means missing.
fn level_value(level: &str) -> Option<String> {
    let value = level.rsplit("__").next().unwrap_or_default().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Work out which column position holds which rank, using the first row
/// that reaches the full lineage depth.
fn rank_positions(lineages: &[Vec<&str>]) -> Vec<Option<Rank>> {
    let depth = lineages.iter().map(Vec::len).max().unwrap_or(0);
    let Some(full) = lineages.iter().find(|l| l.len() == depth) else {
        return Vec::new();
    };

    let mut seen = Vec::new();
    full.iter()
        .map(|level| {
            let prefix = level_prefix(level);
            match Rank::from_prefix(prefix) {
                Some(rank) if seen.contains(&rank) => {
                    warn!("taxonomy prefix '{}' appears more than once, using the first", prefix);
                    None
                }
                Some(rank) => {
                    seen.push(rank);
                    Some(rank)
                }
                None => None,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_taxonomy_from_reader<R: Read>(rdr: R) -> Result<TaxonomyTable, csv::Error> {
    let mut reader = crate::tsv_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawTaxonomyRow>() {
        match result {
            Ok(raw) => {
                let feature_id = raw.feature_id.trim().to_string();
                if feature_id.is_empty() {
                    warn!("skipping taxonomy row with empty feature id");
                    continue;
                }
                rows.push((feature_id, raw.taxon));
            }
            Err(e) => {
                warn!("skipping malformed taxonomy row: {}", e);
            }
        }
    }

    let lineages: Vec<Vec<&str>> = rows.iter().map(|(_, t)| t.split(';').collect()).collect();
    let positions = rank_positions(&lineages);

    let ranks: Vec<Rank> = positions.iter().flatten().copied().collect();
    debug!("taxonomy columns resolved to ranks {:?}", ranks);

    let records = rows
        .iter()
        .zip(&lineages)
        .map(|((feature_id, _), levels)| {
            let mut record = TaxonomyRecord::new(feature_id.as_str());
            for (level, rank) in levels.iter().zip(&positions) {
                if let Some(rank) = rank {
                    *record.slot_mut(*rank) = level_value(level);
                }
            }
            record
        })
        .collect();

    Ok(TaxonomyTable::new(&ranks, records))
}

/// Resolve a taxonomy path: either the TSV itself or a directory holding
/// `taxonomy.tsv`.
pub fn resolve_taxonomy_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(TAXONOMY_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Check the loaded table is usable for annotation.
fn validate(table: TaxonomyTable) -> Result<TaxonomyTable, TaxonomyError> {
    if table.is_empty() {
        return Err(TaxonomyError::Empty);
    }
    if table.ranks().is_empty() {
        return Err(TaxonomyError::MissingRanks);
    }
    Ok(table)
}

/// Load a taxonomy TSV (or `TSVTaxonomyDirectoryFormat` directory).
pub fn load_taxonomy(path: &Path) -> Result<TaxonomyTable, TaxonomyError> {
    let path = resolve_taxonomy_path(path);
    let file = std::fs::File::open(&path).map_err(|e| TaxonomyError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let table = load_taxonomy_from_reader(file).map_err(|e| TaxonomyError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    validate(table)
}

/// Load a taxonomy from any reader. Exposed for callers holding in-memory data.
pub fn parse_taxonomy<R: Read>(rdr: R) -> Result<TaxonomyTable, TaxonomyError> {
    let table = load_taxonomy_from_reader(rdr).map_err(|e| TaxonomyError::Csv {
        path: "<reader>".into(),
        source: e,
    })?;
    validate(table)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unite_style_lineage_parsed() {
        let tsv = "\
Feature ID\tTaxon\tConfidence
f1\tk__Fungi;p__Basidiomycota;c__Agaricomycetes;o__Agaricales;f__Amanitaceae;g__Amanita;s__Amanita_muscaria\t0.99
f2\tk__Fungi;p__Ascomycota;c__Eurotiomycetes;o__Eurotiales;f__Aspergillaceae;g__Penicillium\t0.95";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        assert_eq!(table.ranks(), &[Rank::Family, Rank::Genus, Rank::Species]);
        assert_eq!(table.len(), 2);

        let f1 = &table.records()[0];
        assert_eq!(f1.feature_id, "f1");
        assert_eq!(f1.family.as_deref(), Some("Amanitaceae"));
        assert_eq!(f1.genus.as_deref(), Some("Amanita"));
        assert_eq!(f1.species.as_deref(), Some("Amanita_muscaria"));

        let f2 = &table.records()[1];
        assert_eq!(f2.genus.as_deref(), Some("Penicillium"));
        assert_eq!(f2.species, None);
    }

    #[test]
    fn prefixes_come_from_fully_annotated_row() {
        // The first row is shallow; the deepest row decides the column names.
        let tsv = "\
Feature ID\tTaxon
a\tk__Fungi;p__Ascomycota
b\tk__Fungi;p__Ascomycota;c__Sordariomycetes;o__Hypocreales;f__Nectriaceae;g__Fusarium;s__Fusarium_oxysporum";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        assert_eq!(table.ranks().len(), 3);
        assert_eq!(table.records()[0].rank(Rank::Family), None);
        assert_eq!(table.records()[1].rank(Rank::Family), Some("Nectriaceae"));
    }

    #[test]
    fn spaces_after_separator_are_trimmed() {
        let tsv = "\
Feature ID\tTaxon
a\tk__Fungi; p__Ascomycota; c__Sordariomycetes; o__Hypocreales; f__Nectriaceae; g__Fusarium";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        assert_eq!(table.ranks(), &[Rank::Family, Rank::Genus]);
        assert_eq!(table.records()[0].genus.as_deref(), Some("Fusarium"));
    }

    #[test]
    fn empty_level_values_are_missing() {
        let tsv = "\
Feature ID\tTaxon
a\tk__Fungi;p__Ascomycota;c__;o__;f__;g__;s__
b\tk__Fungi;p__Ascomycota;c__X;o__Y;f__Z;g__Genus;s__Genus_species";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        let a = &table.records()[0];
        assert_eq!(a.family, None);
        assert_eq!(a.genus, None);
        assert_eq!(a.species, None);
    }

    #[test]
    fn missing_ranks_is_an_error() {
        let tsv = "\
Feature ID\tTaxon
a\tk__Fungi;p__Ascomycota;c__Sordariomycetes;o__Hypocreales";

        let err = parse_taxonomy(tsv.as_bytes()).unwrap_err();
        assert!(matches!(err, TaxonomyError::MissingRanks));
        assert!(err.to_string().contains("None of the taxonomy levels"));
    }

    #[test]
    fn header_only_is_empty_error() {
        let tsv = "Feature ID\tTaxon";
        let err = parse_taxonomy(tsv.as_bytes()).unwrap_err();
        assert!(matches!(err, TaxonomyError::Empty));
    }

    #[test]
    fn feature_id_aliases_accepted() {
        let tsv = "\
feature-id\tTaxon
a\tf__Nectriaceae;g__Fusarium";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        assert_eq!(table.records()[0].feature_id, "a");
    }

    #[test]
    fn rows_without_taxon_are_skipped() {
        let tsv = "\
Feature ID\tTaxon
a
b\tf__Nectriaceae;g__Fusarium";

        let table = parse_taxonomy(tsv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].feature_id, "b");
    }

    #[test]
    fn rank_parsing_round_trips_names() {
        for rank in Rank::ALL {
            assert_eq!(rank.as_str().parse::<Rank>().unwrap(), rank);
        }
        assert!("order".parse::<Rank>().is_err());
    }

    #[test]
    fn directory_path_resolves_to_taxonomy_file() {
        let tmp = std::env::temp_dir().join("taxonomy_test_dir_resolve");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(
            tmp.join(TAXONOMY_FILE_NAME),
            "Feature ID\tTaxon\na\tf__Nectriaceae;g__Fusarium\n",
        )
        .unwrap();

        let table = load_taxonomy(&tmp).unwrap();
        assert_eq!(table.len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_taxonomy(Path::new("/nonexistent/taxonomy.tsv")).unwrap_err();
        assert!(matches!(err, TaxonomyError::Io { .. }));
    }
}
