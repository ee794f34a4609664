// Integration tests for the annotation pipeline.
//
// These run the full path from fixture TSV files to metadata output and
// provenance, using only the library crate's public API.

use std::path::{Path, PathBuf};

use fungal_traits_core::annotate::{self, AnnotatePaths, AnnotationOptions, AnnotateError};
use fungal_traits_core::metadata::{ColumnType, Metadata, MetadataValue};
use fungal_traits_core::provenance::Provenance;
use fungal_traits_core::reference::{self, ReferenceError, SporeType};
use fungal_traits_core::taxonomy::{self, Rank, TaxonomyError};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the crate root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES).join(name)
}

fn fixture_paths() -> AnnotatePaths {
    AnnotatePaths {
        taxonomy: fixture("taxonomy.tsv"),
        fungal_traits: fixture("fungal_traits.tsv"),
        spore_data: fixture("spore_data.tsv"),
    }
}

fn number(md: &Metadata, id: &str, column: &str) -> Option<f64> {
    md.get(id, column).and_then(MetadataValue::as_f64)
}

fn text<'a>(md: &'a Metadata, id: &str, column: &str) -> Option<&'a str> {
    md.get(id, column).and_then(MetadataValue::as_str)
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("expected a numeric value");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn fixture_taxonomy_loads_all_ranks() {
    let table = taxonomy::load_taxonomy(&fixture("taxonomy.tsv")).unwrap();
    assert_eq!(table.ranks(), &[Rank::Family, Rank::Genus, Rank::Species]);
    assert_eq!(table.len(), 6);

    let f6 = &table.records()[5];
    assert_eq!(f6.feature_id, "f6");
    assert_eq!(f6.family, None);
    assert_eq!(f6.genus, None);
}

#[test]
fn taxonomy_without_family_genus_species_rejected() {
    let err = taxonomy::load_taxonomy(&fixture("taxonomy_missing_ranks.tsv")).unwrap_err();
    assert!(matches!(err, TaxonomyError::MissingRanks));
}

#[test]
fn fixture_spore_data_drops_unusable_rows() {
    let spores = reference::load_spore_data(&fixture("spore_data.tsv")).unwrap();
    assert_eq!(spores.len(), 7);
    assert_eq!(spores.of_type(SporeType::Mitospores).count(), 2);
    assert_eq!(spores.of_type(SporeType::MultinucleateAsexualSpores).count(), 1);
}

#[test]
fn fixture_traits_validate_and_load() {
    reference::validate_fungal_traits(&fixture("fungal_traits.tsv")).unwrap();
    let traits = reference::load_fungal_traits(&fixture("fungal_traits.tsv")).unwrap();
    assert_eq!(traits.len(), 5);
    assert_eq!(traits.genus_count(), 4);
    assert_eq!(traits.lookup("Mortierella").len(), 2);
}

#[test]
fn bad_traits_header_rejected() {
    let err = reference::validate_fungal_traits(&fixture("fungal_traits_bad_header.tsv")).unwrap_err();
    match err {
        ReferenceError::Format(msg) => {
            assert!(msg.starts_with("Header line does not match FungalTraitsFormat."));
            assert!(msg.contains("Found instead:"));
            assert!(msg.contains("photobiont"));
        }
        other => panic!("expected Format error, got: {other}"),
    }
}

// ===========================================================================
// Full pipeline
// ===========================================================================

#[test]
fn annotate_fixture_end_to_end() {
    let annotation = annotate::annotate_paths(&fixture_paths(), &AnnotationOptions::default()).unwrap();
    let md = &annotation.metadata;

    let ids: Vec<&str> = md.ids().iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["f1", "f2", "f3", "f4", "f5", "f6"]);

    // Species hit.
    assert_close(number(md, "f1", "meiospores_spore_volume"), 100.0);
    assert_eq!(text(md, "f1", "meiospores_spore_volume_information"), Some("species"));

    // Genus geometric mean of 100 and 1000.
    assert_close(number(md, "f2", "meiospores_spore_volume"), 316.227_766_016_837_9);
    assert_eq!(text(md, "f2", "meiospores_spore_volume_information"), Some("genus"));

    // Species hits for two spore types; family fallback for a third.
    assert_close(number(md, "f3", "mitospores_spore_volume"), 50.0);
    assert_close(number(md, "f3", "multinucleate_asexual_spores_spore_volume"), 400.0);
    assert_close(number(md, "f3", "meiospores_spore_volume"), 80.0);
    assert_eq!(text(md, "f3", "meiospores_spore_volume_information"), Some("family"));

    // Unidentified genus falls through to the family mean of 50 and 200.
    assert_close(number(md, "f5", "mitospores_spore_volume"), 100.0);
    assert_eq!(text(md, "f5", "mitospores_spore_volume_information"), Some("family"));

    // Shallow lineage: nothing matches.
    assert_eq!(number(md, "f6", "mitospores_spore_volume"), None);
    assert_eq!(text(md, "f6", "mitospores_spore_volume_information"), Some("no hit"));
    assert_eq!(text(md, "f6", "genus"), None);

    // Traits joined on genus; the duplicated genus keeps its first row.
    assert_eq!(text(md, "f1", "primary_lifestyle"), Some("ectomycorrhizal"));
    assert_eq!(text(md, "f1", "Ectomycorrhiza_lineage_template"), Some("/amanita"));
    assert_eq!(text(md, "f3", "Plant_pathogenic_capacity_template"), Some("root_pathogen"));
    assert_eq!(text(md, "f4", "primary_lifestyle"), Some("soil_saprotroph"));
    assert_eq!(text(md, "f5", "primary_lifestyle"), None);

    let summary = &annotation.summary;
    assert_eq!(summary.features, 6);
    assert_eq!(summary.trait_hits, 4);
    assert_eq!(summary.duplicates_dropped, 1);
    let meio = summary
        .spore_types
        .iter()
        .find(|s| s.spore_type == "Meiospores")
        .unwrap();
    assert_eq!((meio.species, meio.genus, meio.family, meio.no_hit), (1, 1, 2, 2));
}

#[test]
fn output_columns_exclude_reference_taxonomy() {
    let annotation = annotate::annotate_paths(&fixture_paths(), &AnnotationOptions::default()).unwrap();
    let columns = annotation.metadata.columns();

    assert_eq!(columns[0].name, "genus");
    assert_eq!(columns[1].name, "mitospores_spore_volume");
    assert_eq!(columns[1].column_type, ColumnType::Numeric);
    assert_eq!(columns[2].column_type, ColumnType::Categorical);
    // genus + 4 spore types x 2 + 17 trait columns
    assert_eq!(columns.len(), 1 + 8 + 17);
    for dropped in ["family", "species", "GENUS", "Phylum", "Family", "jrk_template", "COMMENT on genus"] {
        assert!(
            columns.iter().all(|c| c.name != dropped),
            "column {dropped} should not be in the output"
        );
    }
}

#[test]
fn metadata_file_round_trips_through_disk() {
    let tmp = std::env::temp_dir().join("annotate_test_metadata_disk");
    let _ = std::fs::remove_dir_all(&tmp);

    let annotation = annotate::annotate_paths(&fixture_paths(), &AnnotationOptions::default()).unwrap();
    let out = tmp.join("nested").join("annotations.tsv");
    annotation.metadata.save(&out).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("feature-id\tgenus\tmitospores_spore_volume\t"));
    assert!(lines.next().unwrap().starts_with("#q2:types\tcategorical\tnumeric\tcategorical"));

    let back = Metadata::load(&out).unwrap();
    assert_eq!(back.ids(), annotation.metadata.ids());
    assert_eq!(back.columns(), annotation.metadata.columns());

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn provenance_sidecar_records_run() {
    let tmp = std::env::temp_dir().join("annotate_test_provenance");
    let _ = std::fs::remove_dir_all(&tmp);
    std::fs::create_dir_all(&tmp).unwrap();

    let paths = fixture_paths();
    let options = AnnotationOptions::default();
    let annotation = annotate::annotate_paths(&paths, &options).unwrap();
    let out = tmp.join("annotations.tsv");
    annotation.metadata.save(&out).unwrap();

    let prov = Provenance::for_annotate(&paths, &out, &options, &annotation.summary);
    let sidecar = prov.write_sidecar().unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(json["plugin"], "fungal-traits");
    assert_eq!(json["action"], "annotate");
    assert_eq!(json["summary"]["features"], 6);
    assert_eq!(json["options"]["fallback_ranks"][0], "genus");

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn species_only_options_skip_fallbacks() {
    let options = AnnotationOptions {
        spore_types: vec![SporeType::Meiospores],
        fallback_ranks: vec![],
    };
    let annotation = annotate::annotate_paths(&fixture_paths(), &options).unwrap();
    let md = &annotation.metadata;

    assert_eq!(text(md, "f1", "meiospores_spore_volume_information"), Some("species"));
    assert_eq!(text(md, "f2", "meiospores_spore_volume_information"), Some("no hit"));
    assert!(md.column_index("mitospores_spore_volume").is_none());
}

#[test]
fn missing_reference_file_surfaces_path() {
    let mut paths = fixture_paths();
    paths.spore_data = fixture("does_not_exist.tsv");

    let err = annotate::annotate_paths(&paths, &AnnotationOptions::default()).unwrap_err();
    match err {
        AnnotateError::Reference(ReferenceError::Io { path, .. }) => {
            assert!(path.ends_with("does_not_exist.tsv"));
        }
        other => panic!("expected Reference Io error, got: {other}"),
    }
}
