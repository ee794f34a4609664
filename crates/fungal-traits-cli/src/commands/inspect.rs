use super::OutputFormat;
use anyhow::{Context, Result};
use fungal_traits_core::metadata::{ColumnType, Metadata};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Per-column fill counts.
struct ColumnStats<'a> {
    name: &'a str,
    column_type: ColumnType,
    filled: usize,
    /// Value counts for `*_information` columns.
    levels: BTreeMap<&'a str, usize>,
}

fn column_stats(metadata: &Metadata) -> Vec<ColumnStats<'_>> {
    let mut stats: Vec<ColumnStats<'_>> = metadata
        .columns()
        .iter()
        .map(|c| ColumnStats {
            name: &c.name,
            column_type: c.column_type,
            filled: 0,
            levels: BTreeMap::new(),
        })
        .collect();

    for (_, cells) in metadata.rows() {
        for (stat, cell) in stats.iter_mut().zip(cells) {
            let Some(value) = cell else {
                continue;
            };
            stat.filled += 1;
            if stat.name.ends_with("_information") {
                if let Some(level) = value.as_str() {
                    *stat.levels.entry(level).or_default() += 1;
                }
            }
        }
    }
    stats
}

pub fn run(path: &Path, format: &str) -> Result<()> {
    info!("Loading metadata: {}", path.display());
    let metadata = Metadata::load(path).with_context(|| format!("failed to read {}", path.display()))?;
    let stats = column_stats(&metadata);

    match OutputFormat::parse(format) {
        OutputFormat::Json => {
            let columns: Vec<_> = stats
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "type": s.column_type.as_str(),
                        "filled": s.filled,
                        "levels": s.levels,
                    })
                })
                .collect();
            let doc = json!({
                "path": path.display().to_string(),
                "id_header": metadata.id_header(),
                "rows": metadata.len(),
                "columns": columns,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            println!("Metadata: {}", path.display());
            println!("Rows:     {}", metadata.len());
            println!("Columns:  {}\n", stats.len());
            for s in &stats {
                println!(
                    "  {:<48} {:<12} {:>6}/{}",
                    s.name,
                    s.column_type.as_str(),
                    s.filled,
                    metadata.len()
                );
                for (level, count) in &s.levels {
                    println!("      {level}: {count}");
                }
            }
        }
    }
    Ok(())
}
