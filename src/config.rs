//! Configuration for librepo.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LIBREPO_HOME, LIBREPO_LIBRARIES, LIBREPO_REGISTRY)
//! 2. Config file (.librepo/config.yaml)
//! 3. Defaults (~/.librepo, no registry)
//!
//! Config file discovery:
//! - Searches current directory and parents for .librepo/config.yaml
//! - Paths in config file are relative to the project root (parent of .librepo/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::repository::build::DEFAULT_TIMEOUT_SECS;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryConfig {
    /// Filesystem repository root (relative to the project root)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// librepo home directory
    pub home: PathBuf,
    /// Root of the local filesystem repository
    pub libraries: PathBuf,
    /// Remote registry, if one is configured
    pub registry: Option<RegistrySettings>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl RegistrySettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".librepo").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge the config file (if any) with environment overrides
fn resolve(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    file: Option<ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let home = env("LIBREPO_HOME")
        .map(PathBuf::from)
        .unwrap_or(default_home);

    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent()) // .librepo/
        .and_then(|p| p.parent()) // project root
        .unwrap_or(Path::new("."));

    let libraries = if let Some(env_libs) = env("LIBREPO_LIBRARIES") {
        PathBuf::from(env_libs)
    } else if let Some(path) = file.as_ref().and_then(|f| f.repository.path.as_deref()) {
        resolve_path(base_dir, path)
    } else {
        home.join("libraries")
    };

    let registry_file = file.as_ref().and_then(|f| f.registry.as_ref());
    let timeout_seconds = registry_file
        .and_then(|r| r.timeout_seconds)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let registry = env("LIBREPO_REGISTRY")
        .or_else(|| registry_file.and_then(|r| r.endpoint.clone()))
        .map(|endpoint| RegistrySettings {
            endpoint,
            timeout_seconds,
        });

    ResolvedConfig {
        home,
        libraries,
        registry,
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".librepo");

    let config_file = find_config_file();
    let file = match config_file.as_deref() {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(default_home, config_file, file, |key| {
        std::env::var(key).ok()
    }))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the local library repository root.
pub fn libraries_dir() -> Result<PathBuf> {
    Ok(config()?.libraries.clone())
}

/// Get the configured registry, if any
pub fn registry() -> Result<Option<RegistrySettings>> {
    Ok(config()?.registry.clone())
}
