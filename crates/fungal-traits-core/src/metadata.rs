// QIIME 2 metadata tables: typed columns keyed by feature id, serialised as
// TSV with a `#q2:types` directive row.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

/// Id column header used for feature metadata.
pub const FEATURE_ID_HEADER: &str = "feature-id";

/// First cell of the column-type directive row.
pub const TYPES_DIRECTIVE: &str = "#q2:types";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "numeric" => Some(ColumnType::Numeric),
            "categorical" => Some(ColumnType::Categorical),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Numeric(f64),
    Categorical(String),
}

impl MetadataValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            MetadataValue::Numeric(_) => ColumnType::Numeric,
            MetadataValue::Categorical(_) => ColumnType::Categorical,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Numeric(v) => Some(*v),
            MetadataValue::Categorical(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Numeric(_) => None,
            MetadataValue::Categorical(s) => Some(s),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Numeric(v) => write!(f, "{v}"),
            MetadataValue::Categorical(s) => f.write_str(s),
        }
    }
}

/// A missing cell is `None`.
pub type Cell = Option<MetadataValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
    pub column_type: ColumnType,
}

impl MetadataColumn {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Categorical,
        }
    }
}

/// Metadata table with unique ids and typed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    id_header: String,
    columns: Vec<MetadataColumn>,
    ids: Vec<String>,
    rows: Vec<Vec<Cell>>,
    seen: HashSet<String>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to access file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("duplicate id '{0}'")]
    DuplicateId(String),

    #[error("invalid column name '{name}': {reason}")]
    InvalidColumn { name: String, reason: String },

    #[error("row '{id}' has {found} values, expected {expected}")]
    RowLength {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("value in column '{column}' for id '{id}' is not {expected}")]
    TypeMismatch {
        column: String,
        id: String,
        expected: ColumnType,
    },

    #[error("metadata file has no header row")]
    MissingHeader,

    #[error("unknown column type '{0}' in {TYPES_DIRECTIVE} row")]
    UnknownType(String),
}

// ---------------------------------------------------------------------------
// Construction and access
// ---------------------------------------------------------------------------

impl Metadata {
    /// Create an empty table. Column names must be unique, non-empty and
    /// distinct from the id header.
    pub fn new(
        id_header: impl Into<String>,
        columns: Vec<MetadataColumn>,
    ) -> Result<Self, MetadataError> {
        let id_header = id_header.into();
        let mut names = HashSet::new();
        for column in &columns {
            let reason = if column.name.trim().is_empty() {
                Some("column names must not be empty")
            } else if column.name == id_header {
                Some("column name collides with the id header")
            } else if !names.insert(column.name.as_str()) {
                Some("column names must be unique")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(MetadataError::InvalidColumn {
                    name: column.name.clone(),
                    reason: reason.into(),
                });
            }
        }
        Ok(Self {
            id_header,
            columns,
            ids: Vec::new(),
            rows: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Append a row, checking the id and each cell's type.
    pub fn push_row(&mut self, id: impl Into<String>, cells: Vec<Cell>) -> Result<(), MetadataError> {
        let id = id.into();
        validate_id(&id)?;
        if self.seen.contains(&id) {
            return Err(MetadataError::DuplicateId(id));
        }
        if cells.len() != self.columns.len() {
            return Err(MetadataError::RowLength {
                id,
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        for (column, cell) in self.columns.iter().zip(&cells) {
            if let Some(value) = cell {
                if value.column_type() != column.column_type {
                    return Err(MetadataError::TypeMismatch {
                        column: column.name.clone(),
                        id,
                        expected: column.column_type,
                    });
                }
            }
        }
        self.seen.insert(id.clone());
        self.ids.push(id);
        self.rows.push(cells);
        Ok(())
    }

    pub fn id_header(&self) -> &str {
        &self.id_header
    }

    pub fn columns(&self) -> &[MetadataColumn] {
        &self.columns
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell lookup by id and column name.
    pub fn get(&self, id: &str, column: &str) -> Option<&MetadataValue> {
        let col = self.column_index(column)?;
        let row = self.ids.iter().position(|i| i == id)?;
        self.rows[row][col].as_ref()
    }

    /// Iterate `(id, cells)` in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter().map(Vec::as_slice))
    }
}

fn validate_id(id: &str) -> Result<(), MetadataError> {
    let reason = if id.trim().is_empty() {
        "ids must not be empty"
    } else if id.starts_with('#') {
        "ids must not start with '#'"
    } else if id.trim() != id {
        "ids must not have leading or trailing whitespace"
    } else {
        return Ok(());
    };
    Err(MetadataError::InvalidId {
        id: id.to_string(),
        reason: reason.into(),
    })
}

// ---------------------------------------------------------------------------
// TSV serialisation
// ---------------------------------------------------------------------------

impl Metadata {
    /// Write the table as QIIME 2 metadata TSV.
    pub fn write_tsv<W: Write>(&self, wtr: W) -> Result<(), MetadataError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(wtr);

        let mut header = vec![self.id_header.as_str()];
        header.extend(self.columns.iter().map(|c| c.name.as_str()));
        writer.write_record(&header)?;

        let mut types = vec![TYPES_DIRECTIVE];
        types.extend(self.columns.iter().map(|c| c.column_type.as_str()));
        writer.write_record(&types)?;

        for (id, cells) in self.rows() {
            let mut record = vec![id.to_string()];
            record.extend(
                cells
                    .iter()
                    .map(|c| c.as_ref().map(ToString::to_string).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| MetadataError::Io {
            path: "<writer>".into(),
            source: e,
        })?;
        Ok(())
    }

    /// Write the table to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), MetadataError> {
        let io_err = |e| MetadataError::Io {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.write_tsv(std::io::BufWriter::new(file))
    }

    /// Parse a metadata TSV. Without a `#q2:types` row, a column is numeric
    /// when every non-empty value parses as a finite number.
    pub fn read_tsv<R: Read>(rdr: R) -> Result<Self, MetadataError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Err(MetadataError::MissingHeader),
        };
        let mut fields = header.iter().map(|f| f.trim().to_string());
        let id_header = fields.next().ok_or(MetadataError::MissingHeader)?;
        let names: Vec<String> = fields.collect();

        let mut declared: Option<Vec<ColumnType>> = None;
        let mut raw_rows: Vec<(String, Vec<String>)> = Vec::new();
        for record in records {
            let record = record?;
            let first = record.get(0).unwrap_or_default().trim();
            if first == TYPES_DIRECTIVE {
                let types = record
                    .iter()
                    .skip(1)
                    .map(|t| ColumnType::parse(t).ok_or_else(|| MetadataError::UnknownType(t.into())))
                    .collect::<Result<Vec<_>, _>>()?;
                declared = Some(types);
                continue;
            }
            if first.starts_with('#') || record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let values = (0..names.len())
                .map(|i| record.get(i + 1).unwrap_or_default().trim().to_string())
                .collect();
            raw_rows.push((first.to_string(), values));
        }

        let types: Vec<ColumnType> = (0..names.len())
            .map(|i| match declared.as_ref().and_then(|d| d.get(i)) {
                Some(t) => *t,
                None => infer_type(raw_rows.iter().map(|(_, v)| v[i].as_str())),
            })
            .collect();

        let columns = names
            .into_iter()
            .zip(&types)
            .map(|(name, column_type)| MetadataColumn {
                name,
                column_type: *column_type,
            })
            .collect();
        let mut metadata = Metadata::new(id_header, columns)?;

        for (id, values) in raw_rows {
            let mut cells = Vec::with_capacity(values.len());
            for (i, value) in values.into_iter().enumerate() {
                cells.push(parse_cell(&id, &metadata.columns[i], value)?);
            }
            metadata.push_row(id, cells)?;
        }
        Ok(metadata)
    }

    /// Read a metadata TSV from disk.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let file = std::fs::File::open(path).map_err(|e| MetadataError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::read_tsv(file)
    }
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut any = false;
    for value in values.filter(|v| !v.is_empty()) {
        any = true;
        if !value.parse::<f64>().is_ok_and(f64::is_finite) {
            return ColumnType::Categorical;
        }
    }
    if any {
        ColumnType::Numeric
    } else {
        ColumnType::Categorical
    }
}

fn parse_cell(id: &str, column: &MetadataColumn, value: String) -> Result<Cell, MetadataError> {
    if value.is_empty() {
        return Ok(None);
    }
    match column.column_type {
        ColumnType::Categorical => Ok(Some(MetadataValue::Categorical(value))),
        ColumnType::Numeric => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Some(MetadataValue::Numeric(v)))
            .ok_or_else(|| MetadataError::TypeMismatch {
                column: column.name.clone(),
                id: id.to_string(),
                expected: ColumnType::Numeric,
            }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
