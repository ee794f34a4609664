// FungalTraits reference table: format validation and genus-indexed loading.
//
// The table is the FungalTraits 1.2 release (one row per genus, lifestyle
// and morphology templates as columns). `FungalTraitsDirFmt` is a directory
// holding the table as `fungal_traits.tsv`.

use super::ReferenceError;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the table inside a `FungalTraitsDirFmt` directory.
pub const FUNGAL_TRAITS_FILE_NAME: &str = "fungal_traits.tsv";

/// Column the table is joined on.
pub const GENUS_COLUMN: &str = "GENUS";

/// Header of `FungalTraitsFormat`. Column order is not enforced.
pub const FUNGAL_TRAITS_HEADER: [&str; 24] = [
    "jrk_template",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "GENUS",
    "COMMENT on genus",
    "primary_lifestyle",
    "Secondary_lifestyle",
    "Comment_on_lifestyle_template",
    "Endophytic_interaction_capability_template",
    "Plant_pathogenic_capacity_template",
    "Decay_substrate_template",
    "Decay_type_template",
    "Aquatic_habitat_template",
    "Animal_biotrophic_capacity_template",
    "Specific_hosts",
    "Growth_form_template",
    "Fruitbody_type_template",
    "Hymenium_type_template",
    "Ectomycorrhiza_exploration_type_template",
    "Ectomycorrhiza_lineage_template",
    "primary_photobiont",
    "secondary_photobiont",
];

/// Columns removed after the join: the join key, bookkeeping and the
/// reference's own higher taxonomy.
pub const DROPPED_COLUMNS: [&str; 7] = [
    "GENUS",
    "COMMENT on genus",
    "jrk_template",
    "Phylum",
    "Class",
    "Order",
    "Family",
];

/// Trait values for one reference row, aligned with `TraitsTable::columns`.
pub type TraitRow = Vec<Option<String>>;

/// FungalTraits rows indexed by genus.
#[derive(Debug, Clone, Default)]
pub struct TraitsTable {
    columns: Vec<String>,
    by_genus: HashMap<String, Vec<TraitRow>>,
    rows: usize,
}

impl TraitsTable {
    /// Build a table from trait columns and `(genus, values)` rows.
    pub fn new(columns: Vec<String>, rows: Vec<(String, TraitRow)>) -> Self {
        let mut table = Self {
            columns,
            ..Default::default()
        };
        for (genus, values) in rows {
            table.push(genus, values);
        }
        table
    }

    fn push(&mut self, genus: String, values: TraitRow) {
        self.by_genus.entry(genus).or_default().push(values);
        self.rows += 1;
    }

    /// Trait columns kept in the output, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All reference rows for a genus, in file order.
    pub fn lookup(&self, genus: &str) -> &[TraitRow] {
        self.by_genus.get(genus).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn genus_count(&self) -> usize {
        self.by_genus.len()
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

// ---------------------------------------------------------------------------
// Format validation
// ---------------------------------------------------------------------------

/// Check that a header has exactly the `FungalTraitsFormat` column set.
pub fn check_header(observed: &[String]) -> Result<(), ReferenceError> {
    let expected: HashSet<&str> = FUNGAL_TRAITS_HEADER.into_iter().collect();
    let found: HashSet<&str> = observed.iter().map(String::as_str).collect();
    if expected == found {
        return Ok(());
    }
    Err(ReferenceError::Format(format!(
        "Header line does not match FungalTraitsFormat. It must consist of the \
         following values: {}\n\nFound instead: {}",
        FUNGAL_TRAITS_HEADER.join(", "),
        observed.join(", ")
    )))
}

/// Resolve a `FungalTraitsDirFmt` directory to its table; files pass through.
pub fn resolve_traits_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(FUNGAL_TRAITS_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

fn read_header<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>, csv::Error> {
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Validate a FungalTraits table (file or `FungalTraitsDirFmt` directory).
pub fn validate_fungal_traits(path: &Path) -> Result<(), ReferenceError> {
    let path = resolve_traits_path(path);
    let file = super::open(&path)?;
    let mut reader = crate::tsv_reader(file);
    let header = read_header(&mut reader).map_err(|e| ReferenceError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    check_header(&header)
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_traits_from_reader<R: Read>(rdr: R) -> Result<TraitsTable, ReferenceError> {
    let mut reader = crate::tsv_reader(rdr);
    let header = read_header(&mut reader).map_err(|e| ReferenceError::Csv {
        path: "<reader>".into(),
        source: e,
    })?;
    check_header(&header)?;

    let genus_idx = header
        .iter()
        .position(|h| h == GENUS_COLUMN)
        .ok_or_else(|| ReferenceError::Format(format!("missing {GENUS_COLUMN} column")))?;
    let kept: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, h)| !DROPPED_COLUMNS.contains(&h.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut table = TraitsTable {
        columns: kept.iter().map(|&i| header[i].clone()).collect(),
        ..Default::default()
    };

    for result in reader.records() {
        match result {
            Ok(record) => {
                let Some(genus) = record.get(genus_idx).and_then(crate::na_cell) else {
                    debug!("skipping FungalTraits row without a genus");
                    continue;
                };
                let values = kept
                    .iter()
                    .map(|&i| record.get(i).and_then(crate::na_cell))
                    .collect();
                table.push(genus, values);
            }
            Err(e) => {
                warn!("skipping malformed FungalTraits row: {}", e);
            }
        }
    }
    Ok(table)
}

/// Load a FungalTraits table (file or `FungalTraitsDirFmt` directory),
/// validating its header first.
pub fn load_fungal_traits(path: &Path) -> Result<TraitsTable, ReferenceError> {
    let path = resolve_traits_path(path);
    let file = super::open(&path)?;
    let table = load_traits_from_reader(file).map_err(|e| match e {
        ReferenceError::Csv { source, .. } => ReferenceError::Csv {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    if table.is_empty() {
        return Err(ReferenceError::Validation(format!(
            "FungalTraits table {} produced zero rows with a genus",
            path.display()
        )));
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
