// Plugin descriptor: identity, registered formats and semantic types,
// actions and citations, as listed by `fungal-traits info`.

use serde::Serialize;
use std::fmt::Write as _;

pub const PLUGIN_NAME: &str = "fungal-traits";
pub const PLUGIN_PACKAGE: &str = "q2_fungal_traits";
pub const PLUGIN_WEBSITE: &str = "https://github.com/bokulich-lab/q2-fugal-traits";
pub const PLUGIN_DESCRIPTION: &str =
    "A QIIME 2 plugin to annotate fungal sequences with lifestyle traits.";
pub const PLUGIN_SHORT_DESCRIPTION: &str = "Lifestyle traits annotation of fungal sequences.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

/// A semantic type bound to the directory format its artifacts use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticTypeRegistration {
    pub semantic_type: &'static str,
    pub artifact_format: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub inputs: Vec<ParameterDescriptor>,
    pub outputs: Vec<ParameterDescriptor>,
}

/// A BibTeX entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub key: &'static str,
    pub entry_type: &'static str,
    pub fields: Vec<(&'static str, &'static str)>,
}

impl Citation {
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{},\n", self.entry_type, self.key);
        for (name, value) in &self.fields {
            let _ = writeln!(out, " {name} = {{{value}}},");
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plugin {
    pub name: &'static str,
    pub version: &'static str,
    pub website: &'static str,
    pub package: &'static str,
    pub description: &'static str,
    pub short_description: &'static str,
    pub formats: Vec<FormatDescriptor>,
    pub semantic_types: Vec<SemanticTypeRegistration>,
    pub actions: Vec<ActionDescriptor>,
    pub citations: Vec<Citation>,
}

impl Plugin {
    /// The registered fungal-traits plugin.
    pub fn fungal_traits() -> Self {
        Self {
            name: PLUGIN_NAME,
            version: env!("CARGO_PKG_VERSION"),
            website: PLUGIN_WEBSITE,
            package: PLUGIN_PACKAGE,
            description: PLUGIN_DESCRIPTION,
            short_description: PLUGIN_SHORT_DESCRIPTION,
            formats: vec![
                FormatDescriptor {
                    name: "FungalTraitsFormat",
                    description: "FungalTraits reference table (TSV with the 24 FungalTraits columns)",
                },
                FormatDescriptor {
                    name: "FungalTraitsDirFmt",
                    description: "Directory holding a single fungal_traits.tsv",
                },
            ],
            semantic_types: vec![SemanticTypeRegistration {
                semantic_type: "FeatureData[FungalTraits]",
                artifact_format: "FungalTraitsDirFmt",
            }],
            actions: vec![ActionDescriptor {
                id: "annotate",
                name: "Annotate fungal features with lifestyle traits",
                description: "Annotate each feature's taxonomy with spore volumes \
                              (species, then genus and family geometric means) and \
                              FungalTraits lifestyle data matched on genus.",
                inputs: vec![ParameterDescriptor {
                    name: "taxonomy",
                    kind: "FeatureData[Taxonomy]",
                    description: "Feature taxonomy with family, genus or species levels.",
                }],
                outputs: vec![ParameterDescriptor {
                    name: "annotations",
                    kind: "Metadata",
                    description: "Per-feature spore volumes and lifestyle traits.",
                }],
            }],
            citations: vec![
                Citation {
                    key: "Caporaso-Bolyen-2024",
                    entry_type: "misc",
                    fields: vec![
                        ("author", "Caporaso, J. Gregory and Bolyen, Evan"),
                        ("title", "Developing with QIIME 2"),
                        ("year", "2024"),
                        ("url", "https://develop.qiime2.org/"),
                    ],
                },
                Citation {
                    key: "Polme-2020",
                    entry_type: "article",
                    fields: vec![
                        ("author", "P{\\~o}lme, Sergei and Abarenkov, Kessy and others"),
                        (
                            "title",
                            "FungalTraits: a user-friendly traits database of fungi and fungus-like stramenopiles",
                        ),
                        ("journal", "Fungal Diversity"),
                        ("volume", "105"),
                        ("pages", "1--16"),
                        ("year", "2020"),
                        ("doi", "10.1007/s13225-020-00466-2"),
                    ],
                },
            ],
        }
    }

    pub fn action(&self, id: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn citation(&self, key: &str) -> Option<&Citation> {
        self.citations.iter().find(|c| c.key == key)
    }

    /// All citations as one BibTeX document.
    pub fn bibtex(&self) -> String {
        self.citations
            .iter()
            .map(Citation::to_bibtex)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human-readable listing used by the `info` command.
    pub fn info_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Name:        {}", self.name);
        let _ = writeln!(out, "Version:     {}", self.version);
        let _ = writeln!(out, "Website:     {}", self.website);
        let _ = writeln!(out, "Package:     {}", self.package);
        let _ = writeln!(out, "Description: {}", self.description);

        out.push_str("\nFormats:\n");
        for f in &self.formats {
            let _ = writeln!(out, "  {:<22}{}", f.name, f.description);
        }
        out.push_str("\nSemantic types:\n");
        for t in &self.semantic_types {
            let _ = writeln!(out, "  {} -> {}", t.semantic_type, t.artifact_format);
        }
        out.push_str("\nActions:\n");
        for a in &self.actions {
            let _ = writeln!(out, "  {:<22}{}", a.id, a.name);
            for p in &a.inputs {
                let _ = writeln!(out, "    in:  {}: {}", p.name, p.kind);
            }
            for p in &a.outputs {
                let _ = writeln!(out, "    out: {}: {}", p.name, p.kind);
            }
        }
        out.push_str("\nCitations:\n");
        for c in &self.citations {
            let _ = writeln!(out, "  {}", c.key);
        }
        out
    }
}
