// Configuration loading and parsing (fungal-traits.toml).

use crate::annotate::AnnotationOptions;
use crate::reference::SporeType;
use crate::taxonomy::Rank;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the configuration file inside `config/` and `defaults/`.
pub const CONFIG_FILE_NAME: &str = "fungal-traits.toml";

const DEFAULT_FUNGAL_TRAITS: &str = "data/reference/FungalTraits_1.2_ver_16Dec_2020_V.1.2.tsv";
const DEFAULT_SPORE_DATA: &str = "data/reference/Spore_data_12Nov21.tsv";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub reference: ReferencePaths,
    pub annotation: AnnotationOptions,
    pub output: OutputConfig,
    /// File the config was read from; `None` for built-in defaults.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePaths {
    pub fungal_traits: PathBuf,
    pub spore_data: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub write_provenance: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_provenance: true,
        }
    }
}

impl Config {
    /// Built-in defaults with reference paths resolved against `base_dir`,
    /// the same way a config file's relative paths are.
    pub fn defaults_in(base_dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            reference: ReferencePaths {
                fungal_traits: base_dir.join(defaults.reference.fungal_traits),
                spore_data: base_dir.join(defaults.reference.spore_data),
            },
            ..defaults
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference: ReferencePaths {
                fungal_traits: PathBuf::from(DEFAULT_FUNGAL_TRAITS),
                spore_data: PathBuf::from(DEFAULT_SPORE_DATA),
            },
            annotation: AnnotationOptions::default(),
            output: OutputConfig::default(),
            source: None,
        }
    }
}

// ---------------------------------------------------------------------------
// fungal-traits.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    reference: ReferenceSection,
    #[serde(default)]
    annotation: AnnotationSection,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ReferenceSection {
    fungal_traits: String,
    spore_data: String,
}

/// Names stay strings until validation so errors can name the field.
#[derive(Debug, Clone, Deserialize)]
struct AnnotationSection {
    #[serde(default = "default_spore_types")]
    spore_types: Vec<String>,
    #[serde(default = "default_fallback_ranks")]
    fallback_ranks: Vec<String>,
}

impl Default for AnnotationSection {
    fn default() -> Self {
        Self {
            spore_types: default_spore_types(),
            fallback_ranks: default_fallback_ranks(),
        }
    }
}

fn default_spore_types() -> Vec<String> {
    SporeType::ALL.iter().map(|t| t.as_str().to_string()).collect()
}

fn default_fallback_ranks() -> Vec<String> {
    vec!["genus".into(), "family".into()]
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/fungal-traits.toml` relative to `base_dir`.
/// Relative reference paths are resolved against `base_dir`.
///
/// This does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE_NAME);
    parse_config_file(&path, base_dir)
}

/// Load and validate an explicit config file. Relative reference paths are
/// resolved against the file's directory.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config_file(path, base)
}

fn parse_config_file(path: &Path, base_dir: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        reference: ReferencePaths {
            fungal_traits: resolve(base_dir, "reference.fungal_traits", &file.reference.fungal_traits)?,
            spore_data: resolve(base_dir, "reference.spore_data", &file.reference.spore_data)?,
        },
        annotation: AnnotationOptions {
            spore_types: parse_spore_types(&file.annotation.spore_types)?,
            fallback_ranks: parse_fallback_ranks(&file.annotation.fallback_ranks)?,
        },
        output: file.output,
        source: Some(path.to_path_buf()),
    };
    debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Copy every file in `defaults/` that `config/` lacks and return the copied
/// paths. Existing config files are never touched; `.example` templates stay
/// in `defaults/`.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_error(format!(
                "neither defaults/ nor config/ directory found in {}",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for source in default_files(&defaults_dir)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)? {
            debug!("initialized {} from defaults", target.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Regular files in `defaults/` except `.example` templates, sorted by name.
fn default_files(defaults_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let list_error = |e: std::io::Error| copy_error(format!("cannot list {}: {e}", defaults_dir.display()));
    let mut files = Vec::new();
    for entry in std::fs::read_dir(defaults_dir).map_err(list_error)? {
        let path = entry.map_err(list_error)?.path();
        let template = path.extension().is_some_and(|ext| ext == "example");
        if path.is_file() && !template {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Returns `false` when `target` already exists. `create_new` never
/// overwrites.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    let mut src = std::fs::File::open(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    std::io::copy(&mut src, &mut dest)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Per-user config file, e.g. `~/.config/fungal-traits/fungal-traits.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "bokulich-lab", "fungal-traits")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Resolve configuration for the current working directory:
/// 1. `./config/fungal-traits.toml`, after copying `./defaults/` if present;
/// 2. the per-user config file;
/// 3. built-in defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_in(&cwd, user_config_path().as_deref())
}

/// `load_config` with an explicit working directory and user config path.
pub fn load_config_in(base_dir: &Path, user_config: Option<&Path>) -> Result<Config, ConfigError> {
    if base_dir.join("defaults").exists() || base_dir.join("config").exists() {
        ensure_config_files(base_dir)?;
        if base_dir.join("config").join(CONFIG_FILE_NAME).exists() {
            return load_config_from(base_dir);
        }
    }
    if let Some(user) = user_config.filter(|p| p.exists()) {
        return load_config_file(user);
    }
    debug!("no config file found, using built-in defaults");
    Ok(Config::defaults_in(base_dir))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn resolve(base_dir: &Path, field: &str, value: &str) -> Result<PathBuf, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
    let path = PathBuf::from(value);
    Ok(if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    })
}

fn parse_spore_types(names: &[String]) -> Result<Vec<SporeType>, ConfigError> {
    let field = "annotation.spore_types";
    if names.is_empty() {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: "must list at least one spore type".into(),
        });
    }
    let mut types = Vec::with_capacity(names.len());
    for name in names {
        let spore_type = name
            .parse::<SporeType>()
            .map_err(|message| ConfigError::ValidationError {
                field: field.into(),
                message,
            })?;
        if types.contains(&spore_type) {
            return Err(ConfigError::ValidationError {
                field: field.into(),
                message: format!("'{spore_type}' is listed more than once"),
            });
        }
        types.push(spore_type);
    }
    Ok(types)
}

fn parse_fallback_ranks(names: &[String]) -> Result<Vec<Rank>, ConfigError> {
    let field = "annotation.fallback_ranks";
    let mut ranks = Vec::with_capacity(names.len());
    for name in names {
        let rank = name
            .parse::<Rank>()
            .map_err(|message| ConfigError::ValidationError {
                field: field.into(),
                message,
            })?;
        if rank == Rank::Species {
            return Err(ConfigError::ValidationError {
                field: field.into(),
                message: "species is always tried first and cannot be a fallback".into(),
            });
        }
        if ranks.contains(&rank) {
            return Err(ConfigError::ValidationError {
                field: field.into(),
                message: format!("'{rank}' is listed more than once"),
            });
        }
        ranks.push(rank);
    }
    Ok(ranks)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
