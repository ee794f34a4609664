// Spore-size reference table loading.
//
// Reads the tab-separated spore database (names_to_use, SporeType,
// SporeVolume, genus, family, ...). Volumes are in cubic micrometres and are
// aggregated on a log10 scale, so each kept row carries its log10 volume.

use super::ReferenceError;
use crate::taxonomy::Rank;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Spore categories that receive their own annotation columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SporeType {
    Mitospores,
    Meiospores,
    #[serde(rename = "Multinucleate_sexual_spores")]
    MultinucleateSexualSpores,
    #[serde(rename = "Multinucleate_asexual_spores")]
    MultinucleateAsexualSpores,
}

impl SporeType {
    pub const ALL: [SporeType; 4] = [
        SporeType::Mitospores,
        SporeType::Meiospores,
        SporeType::MultinucleateSexualSpores,
        SporeType::MultinucleateAsexualSpores,
    ];

    /// Name as it appears in the `SporeType` column (spaces replaced by `_`).
    pub fn as_str(self) -> &'static str {
        match self {
            SporeType::Mitospores => "Mitospores",
            SporeType::Meiospores => "Meiospores",
            SporeType::MultinucleateSexualSpores => "Multinucleate_sexual_spores",
            SporeType::MultinucleateAsexualSpores => "Multinucleate_asexual_spores",
        }
    }

    /// Output column holding the volume, e.g. `mitospores_spore_volume`.
    pub fn volume_column(self) -> String {
        format!("{}_spore_volume", self.as_str().to_lowercase())
    }

    /// Output column recording which level produced the volume.
    pub fn information_column(self) -> String {
        format!("{}_spore_volume_information", self.as_str().to_lowercase())
    }
}

impl fmt::Display for SporeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SporeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(' ', "_");
        SporeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown spore type '{}'", s.trim()))
    }
}

/// One spore measurement with a positive volume.
#[derive(Debug, Clone, PartialEq)]
pub struct SporeRecord {
    /// Species name with spaces replaced by underscores.
    pub name: String,
    /// Spore type with spaces replaced by underscores.
    pub spore_type: String,
    pub volume: f64,
    pub log10_volume: f64,
    pub genus: Option<String>,
    pub family: Option<String>,
}

impl SporeRecord {
    /// Build a record, normalizing names and computing the log10 volume.
    pub fn new(
        name: &str,
        spore_type: &str,
        volume: f64,
        genus: Option<&str>,
        family: Option<&str>,
    ) -> Self {
        Self {
            name: underscored(name),
            spore_type: underscored(spore_type),
            volume,
            log10_volume: volume.log10(),
            genus: genus.map(str::to_string),
            family: family.map(str::to_string),
        }
    }

    /// The record's value at a rank. Species is matched on `names_to_use`.
    pub fn rank(&self, rank: Rank) -> Option<&str> {
        match rank {
            Rank::Species => Some(self.name.as_str()),
            Rank::Genus => self.genus.as_deref(),
            Rank::Family => self.family.as_deref(),
        }
    }

    pub fn is_type(&self, spore_type: SporeType) -> bool {
        self.spore_type == spore_type.as_str()
    }
}

/// All usable spore measurements.
#[derive(Debug, Clone, Default)]
pub struct SporeTable {
    records: Vec<SporeRecord>,
}

impl SporeTable {
    pub fn from_records(records: Vec<SporeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SporeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of a single spore type.
    pub fn of_type(&self, spore_type: SporeType) -> impl Iterator<Item = &SporeRecord> {
        self.records.iter().filter(move |r| r.is_type(spore_type))
    }
}

// ---------------------------------------------------------------------------
// Raw TSV serde struct (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawSporeRow {
    names_to_use: String,
    SporeType: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    SporeVolume: Option<f64>,
    #[serde(default, alias = "Genus")]
    genus: Option<String>,
    #[serde(default, alias = "Family")]
    family: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn underscored(s: &str) -> String {
    s.trim().replace(' ', "_")
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_spores_from_reader<R: Read>(rdr: R) -> Result<SporeTable, csv::Error> {
    let mut reader = crate::tsv_reader(rdr);
    let mut records = Vec::new();
    let mut unknown_types = 0usize;
    for result in reader.deserialize::<RawSporeRow>() {
        match result {
            Ok(raw) => {
                let Some(volume) = raw.SporeVolume.filter(|v| v.is_finite() && *v > 0.0) else {
                    continue;
                };
                let genus = raw.genus.as_deref().and_then(crate::na_cell);
                let family = raw.family.as_deref().and_then(crate::na_cell);
                let record = SporeRecord::new(
                    &raw.names_to_use,
                    &raw.SporeType,
                    volume,
                    genus.as_deref(),
                    family.as_deref(),
                );
                if record.spore_type.parse::<SporeType>().is_err() {
                    unknown_types += 1;
                }
                records.push(record);
            }
            Err(e) => {
                warn!("skipping malformed spore row: {}", e);
            }
        }
    }
    if unknown_types > 0 {
        debug!("{} spore rows have a type outside the annotated set", unknown_types);
    }
    Ok(SporeTable::from_records(records))
}

/// Load the spore-size reference table from a TSV file.
pub fn load_spore_data(path: &Path) -> Result<SporeTable, ReferenceError> {
    let file = super::open(path)?;
    let table = load_spores_from_reader(file).map_err(|e| ReferenceError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if table.is_empty() {
        return Err(ReferenceError::Validation(format!(
            "spore table {} produced zero rows with a positive SporeVolume",
            path.display()
        )));
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
