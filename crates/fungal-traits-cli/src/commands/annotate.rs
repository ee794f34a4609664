use anyhow::{bail, Context, Result};
use fungal_traits_core::annotate::{self, AnnotatePaths, AnnotationOptions, AnnotationSummary};
use fungal_traits_core::config::{self, Config};
use fungal_traits_core::provenance::Provenance;
use fungal_traits_core::reference::SporeType;
use fungal_traits_core::taxonomy::Rank;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct AnnotateArgs {
    pub taxonomy: PathBuf,
    pub output: PathBuf,
    pub traits: Option<PathBuf>,
    pub spores: Option<PathBuf>,
    pub spore_types: Vec<SporeType>,
    pub fallback_ranks: Vec<Rank>,
    pub no_provenance: bool,
}

pub fn run(config_path: Option<&Path>, args: AnnotateArgs) -> Result<()> {
    let config = load(config_path)?;
    match &config.source {
        Some(path) => info!("Using config {}", path.display()),
        None => info!("Using built-in configuration"),
    }

    let (options, paths) = merge_options(&config, &args)?;
    debug!("annotation options: {:?}", options);
    check_references(&paths)?;

    let annotation = annotate::annotate_paths(&paths, &options)
        .with_context(|| format!("failed to annotate {}", paths.taxonomy.display()))?;

    annotation
        .metadata
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    if writes_provenance(&config, &args) {
        let provenance = Provenance::for_annotate(&paths, &args.output, &options, &annotation.summary);
        let sidecar = provenance.write_sidecar()?;
        info!("Wrote provenance {}", sidecar.display());
    }

    print_summary(&args.output, &annotation.summary);
    Ok(())
}

fn load(config_path: Option<&Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config()?,
    };
    Ok(config)
}

/// Apply command-line overrides on top of the loaded config. Empty lists
/// keep the configured values.
fn merge_options(config: &Config, args: &AnnotateArgs) -> Result<(AnnotationOptions, AnnotatePaths)> {
    let mut options = config.annotation.clone();
    if !args.spore_types.is_empty() {
        options.spore_types = args.spore_types.clone();
    }
    if !args.fallback_ranks.is_empty() {
        if args.fallback_ranks.contains(&Rank::Species) {
            bail!("species is always consulted first and cannot be a fallback rank");
        }
        options.fallback_ranks = args.fallback_ranks.clone();
    }

    let paths = AnnotatePaths {
        taxonomy: args.taxonomy.clone(),
        fungal_traits: args
            .traits
            .clone()
            .unwrap_or_else(|| config.reference.fungal_traits.clone()),
        spore_data: args
            .spores
            .clone()
            .unwrap_or_else(|| config.reference.spore_data.clone()),
    };
    Ok((options, paths))
}

fn writes_provenance(config: &Config, args: &AnnotateArgs) -> bool {
    config.output.write_provenance && !args.no_provenance
}

/// The reference tables are not bundled; point at the flag or config key
/// when one is missing.
fn check_references(paths: &AnnotatePaths) -> Result<()> {
    if !paths.fungal_traits.exists() {
        bail!(
            "FungalTraits table not found at {}; pass --traits or set reference.fungal_traits",
            paths.fungal_traits.display()
        );
    }
    if !paths.spore_data.exists() {
        bail!(
            "spore table not found at {}; pass --spores or set reference.spore_data",
            paths.spore_data.display()
        );
    }
    Ok(())
}

fn print_summary(output: &Path, summary: &AnnotationSummary) {
    println!("\n=== Annotation Summary ===\n");
    println!("Output:             {}", output.display());
    println!("Features:           {}", summary.features);
    println!("FungalTraits hits:  {}", summary.trait_hits);
    println!("Duplicates dropped: {}", summary.duplicates_dropped);

    println!(
        "\n{:<30} {:>8} {:>8} {:>8} {:>8}",
        "Spore type", "species", "genus", "family", "no hit"
    );
    for s in &summary.spore_types {
        println!(
            "{:<30} {:>8} {:>8} {:>8} {:>8}",
            s.spore_type, s.species, s.genus, s.family, s.no_hit
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../fungal-traits-core/tests/fixtures")
    }

    fn args() -> AnnotateArgs {
        AnnotateArgs {
            taxonomy: PathBuf::from("taxonomy.tsv"),
            output: PathBuf::from("out.tsv"),
            traits: None,
            spores: None,
            spore_types: Vec::new(),
            fallback_ranks: Vec::new(),
            no_provenance: false,
        }
    }

    /// Temp dir holding a config file that points at the core fixtures.
    fn fixture_config(name: &str, write_provenance: bool) -> (PathBuf, PathBuf) {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        let text = format!(
            "[reference]\nfungal_traits = {:?}\nspore_data = {:?}\n\n[output]\nwrite_provenance = {}\n",
            fixtures().join("fungal_traits.tsv").display().to_string(),
            fixtures().join("spore_data.tsv").display().to_string(),
            write_provenance
        );
        let config_path = tmp.join("fungal-traits.toml");
        fs::write(&config_path, text).unwrap();
        (tmp, config_path)
    }

    #[test]
    fn no_flags_keep_config() {
        let config = Config::default();
        let (options, paths) = merge_options(&config, &args()).unwrap();

        assert_eq!(options, config.annotation);
        assert_eq!(paths.taxonomy, PathBuf::from("taxonomy.tsv"));
        assert_eq!(paths.fungal_traits, config.reference.fungal_traits);
        assert_eq!(paths.spore_data, config.reference.spore_data);
    }

    #[test]
    fn spore_type_and_rank_flags_replace_config() {
        let config = Config::default();
        let args = AnnotateArgs {
            spore_types: vec![SporeType::Meiospores],
            fallback_ranks: vec![Rank::Family],
            ..args()
        };

        let (options, _) = merge_options(&config, &args).unwrap();
        assert_eq!(options.spore_types, vec![SporeType::Meiospores]);
        assert_eq!(options.fallback_ranks, vec![Rank::Family]);
    }

    #[test]
    fn reference_flags_replace_config() {
        let config = Config::default();
        let args = AnnotateArgs {
            traits: Some(PathBuf::from("my_traits.tsv")),
            spores: Some(PathBuf::from("my_spores.tsv")),
            ..args()
        };

        let (options, paths) = merge_options(&config, &args).unwrap();
        assert_eq!(paths.fungal_traits, PathBuf::from("my_traits.tsv"));
        assert_eq!(paths.spore_data, PathBuf::from("my_spores.tsv"));
        assert_eq!(options, config.annotation);
    }

    #[test]
    fn species_fallback_rejected() {
        let args = AnnotateArgs {
            fallback_ranks: vec![Rank::Genus, Rank::Species],
            ..args()
        };

        let err = merge_options(&Config::default(), &args).unwrap_err();
        assert!(err.to_string().contains("cannot be a fallback rank"));
    }

    #[test]
    fn provenance_needs_config_and_flag() {
        let mut config = Config::default();
        assert!(writes_provenance(&config, &args()));

        let quiet = AnnotateArgs {
            no_provenance: true,
            ..args()
        };
        assert!(!writes_provenance(&config, &quiet));

        config.output.write_provenance = false;
        assert!(!writes_provenance(&config, &args()));
    }

    #[test]
    fn missing_reference_names_the_flag() {
        let paths = AnnotatePaths {
            taxonomy: fixtures().join("taxonomy.tsv"),
            fungal_traits: fixtures().join("fungal_traits.tsv"),
            spore_data: PathBuf::from("/nonexistent/Spore_data.tsv"),
        };
        let err = check_references(&paths).unwrap_err();
        assert!(err.to_string().contains("--spores"));
    }

    #[test]
    fn run_writes_metadata_and_sidecar() {
        let (tmp, config_path) = fixture_config("cli_annotate_test_sidecar", true);
        let output = tmp.join("annotations.tsv");
        let args = AnnotateArgs {
            taxonomy: fixtures().join("taxonomy.tsv"),
            output: output.clone(),
            ..args()
        };

        run(Some(&config_path), args).unwrap();
        assert!(output.exists());
        assert!(Provenance::sidecar_path(&output).exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn run_with_no_provenance_skips_sidecar() {
        let (tmp, config_path) = fixture_config("cli_annotate_test_no_sidecar", true);
        let output = tmp.join("annotations.tsv");
        let args = AnnotateArgs {
            taxonomy: fixtures().join("taxonomy.tsv"),
            output: output.clone(),
            no_provenance: true,
            ..args()
        };

        run(Some(&config_path), args).unwrap();
        assert!(output.exists());
        assert!(!Provenance::sidecar_path(&output).exists());

        let _ = fs::remove_dir_all(&tmp);
    }
}
