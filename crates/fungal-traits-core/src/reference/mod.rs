// Reference databases: FungalTraits lifestyle table and spore-size table.

pub mod spores;
pub mod traits;

pub use spores::{load_spore_data, SporeRecord, SporeTable, SporeType};
pub use traits::{load_fungal_traits, validate_fungal_traits, TraitsTable};

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{0}")]
    Format(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Open a reference file, mapping the failure to `ReferenceError::Io`.
pub(crate) fn open(path: &std::path::Path) -> Result<std::fs::File, ReferenceError> {
    std::fs::File::open(path).map_err(|e| ReferenceError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
