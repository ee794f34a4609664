// Library root: re-exports all modules so the CLI and integration tests can
// access the crate's public API.

pub mod annotate;
pub mod config;
pub mod metadata;
pub mod plugin;
pub mod provenance;
pub mod reference;
pub mod taxonomy;

/// Shared TSV reader settings for every table this crate ingests.
pub(crate) fn tsv_reader<R: std::io::Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(rdr)
}

/// A trimmed cell value, or `None` for blanks and the usual missing-value
/// spellings (`NA`, `NaN`, `None`).
pub(crate) fn na_cell(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || matches!(value, "NA" | "NaN" | "nan" | "None") {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_spellings() {
        for missing in ["", "  ", "NA", "NaN", "nan", "None", " NA "] {
            assert_eq!(na_cell(missing), None, "{missing:?} should be missing");
        }
        assert_eq!(na_cell(" Amanita "), Some("Amanita".to_string()));
        assert_eq!(na_cell("none"), Some("none".to_string()));
    }
}
