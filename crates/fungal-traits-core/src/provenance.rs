// Run provenance: a JSON sidecar describing how a metadata file was made.

use crate::annotate::{AnnotatePaths, AnnotationOptions, AnnotationSummary};
use crate::plugin::Plugin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("failed to write provenance {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to serialize provenance: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub plugin: String,
    pub version: String,
    pub action: String,
    pub executed_at: DateTime<Utc>,
    pub inputs: AnnotatePaths,
    pub output: PathBuf,
    pub options: AnnotationOptions,
    pub summary: AnnotationSummary,
}

impl Provenance {
    /// Record an `annotate` run that finished now.
    pub fn for_annotate(
        inputs: &AnnotatePaths,
        output: &Path,
        options: &AnnotationOptions,
        summary: &AnnotationSummary,
    ) -> Self {
        let plugin = Plugin::fungal_traits();
        Self {
            plugin: plugin.name.to_string(),
            version: plugin.version.to_string(),
            action: "annotate".into(),
            executed_at: Utc::now(),
            inputs: inputs.clone(),
            output: output.to_path_buf(),
            options: options.clone(),
            summary: summary.clone(),
        }
    }

    /// Sidecar path for an output file: `<output>.provenance.json`.
    pub fn sidecar_path(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(".provenance.json");
        PathBuf::from(name)
    }

    pub fn to_json(&self) -> Result<String, ProvenanceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the sidecar next to the output and return its path.
    pub fn write_sidecar(&self) -> Result<PathBuf, ProvenanceError> {
        let path = Self::sidecar_path(&self.output);
        std::fs::write(&path, self.to_json()?).map_err(|e| ProvenanceError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> AnnotatePaths {
        AnnotatePaths {
            taxonomy: PathBuf::from("taxonomy.tsv"),
            fungal_traits: PathBuf::from("traits.tsv"),
            spore_data: PathBuf::from("spores.tsv"),
        }
    }

    #[test]
    fn sidecar_appends_suffix() {
        assert_eq!(
            Provenance::sidecar_path(Path::new("out/annotations.tsv")),
            PathBuf::from("out/annotations.tsv.provenance.json")
        );
    }

    #[test]
    fn json_round_trips() {
        let summary = AnnotationSummary {
            features: 3,
            trait_hits: 2,
            ..Default::default()
        };
        let prov = Provenance::for_annotate(
            &paths(),
            Path::new("annotations.tsv"),
            &AnnotationOptions::default(),
            &summary,
        );
        let json = prov.to_json().unwrap();
        assert!(json.contains("\"action\": \"annotate\""));
        assert!(json.contains("\"Multinucleate_sexual_spores\""));
        assert!(json.contains("\"genus\""));

        let back: Provenance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prov);
    }

    #[test]
    fn sidecar_written_next_to_output() {
        let tmp = std::env::temp_dir().join("provenance_test_sidecar");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let output = tmp.join("annotations.tsv");
        let prov = Provenance::for_annotate(
            &paths(),
            &output,
            &AnnotationOptions::default(),
            &AnnotationSummary::default(),
        );
        let written = prov.write_sidecar().unwrap();
        assert_eq!(written, tmp.join("annotations.tsv.provenance.json"));
        assert!(written.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
