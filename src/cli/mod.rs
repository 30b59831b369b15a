//! Command-line interface for librepo.
//!
//! Lists, inspects, installs and migrates libraries in a local filesystem
//! repository or a remote registry.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::library::LibraryLayout;
use crate::repository::{BuildLibraryRepository, FileSystemLibraryRepository, LibraryRepository};

/// librepo - library repositories for embedded firmware
#[derive(Parser, Debug)]
#[command(name = "librepo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Local repository root (defaults to the configured libraries directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Registry endpoint (defaults to the configured registry)
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Read from the registry instead of the local repository
    #[arg(long, global = true)]
    pub remote: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List library names
    List,

    /// Show the catalog (id, title, version, visibility)
    Index,

    /// Show a library's descriptor
    Show {
        /// Library name
        name: String,
    },

    /// List a library's files
    Files {
        /// Library name
        name: String,
    },

    /// Show the on-disk layout of a local library
    Layout {
        /// Library name
        name: String,
    },

    /// Copy a library into the local repository
    Install {
        /// Library name
        name: String,

        /// Source repository directory (defaults to the registry)
        #[arg(long)]
        from: Option<PathBuf>,

        /// Descriptor layout to write (1 or 2)
        #[arg(short, long, default_value = "2")]
        layout: LibraryLayout,
    },

    /// Convert a local layout 1 library to layout 2
    Migrate {
        /// Library name
        name: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match &self.command {
            Commands::List => list_names(self.source()?.as_ref()).await,
            Commands::Index => show_index(self.source()?.as_ref()).await,
            Commands::Show { name } => show_definition(self.source()?.as_ref(), name).await,
            Commands::Files { name } => list_files(self.source()?.as_ref(), name).await,
            Commands::Layout { name } => show_layout(&self.local()?, name).await,
            Commands::Install { name, from, layout } => {
                let source: Arc<dyn LibraryRepository> = match from {
                    Some(dir) => Arc::new(FileSystemLibraryRepository::new(dir)),
                    None => Arc::new(self.remote()?),
                };
                install(source.as_ref(), &self.local()?, name, *layout).await
            }
            Commands::Migrate { name } => migrate(&self.local()?, name).await,
            Commands::Config => show_config().await,
        }
    }

    fn local(&self) -> Result<FileSystemLibraryRepository> {
        let root = match &self.repo {
            Some(root) => root.clone(),
            None => config::libraries_dir()?,
        };
        Ok(FileSystemLibraryRepository::new(root))
    }

    fn remote(&self) -> Result<BuildLibraryRepository> {
        let settings = match &self.registry {
            Some(endpoint) => config::RegistrySettings::new(endpoint.clone()),
            None => config::registry()?.context(
                "No registry configured. Use --registry <url> or set LIBREPO_REGISTRY",
            )?,
        };
        Ok(BuildLibraryRepository::from_settings(&settings)?)
    }

    /// Repository the read commands operate on
    fn source(&self) -> Result<Arc<dyn LibraryRepository>> {
        if self.remote {
            Ok(Arc::new(self.remote()?))
        } else {
            Ok(Arc::new(self.local()?))
        }
    }
}

/// Print every library name
async fn list_names(repo: &dyn LibraryRepository) -> Result<()> {
    let names = repo.names().await?;

    if names.is_empty() {
        println!("No libraries in {}", repo.location());
        return Ok(());
    }

    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Print the catalog
async fn show_index(repo: &dyn LibraryRepository) -> Result<()> {
    let summaries = repo.index().await?;

    println!("{:<24} {:<10} {:<8} {}", "TITLE", "VERSION", "VISIBLE", "DESCRIPTION");
    println!("{}", "-".repeat(72));
    for summary in summaries {
        println!(
            "{:<24} {:<10} {:<8} {}",
            summary.title, summary.version, summary.visibility, summary.content
        );
    }
    Ok(())
}

/// Print a library's descriptor
async fn show_definition(repo: &dyn LibraryRepository, name: &str) -> Result<()> {
    let library = repo.fetch(name).await?;
    let definition = library.definition().await?;

    println!("Name: {}", definition.name);
    if let Some(version) = &definition.version {
        println!("Version: {}", version);
    }
    if let Some(author) = &definition.author {
        println!("Author: {}", author);
    }
    if let Some(license) = &definition.license {
        println!("License: {}", license);
    }
    if let Some(description) = &definition.description {
        println!("Description: {}", description);
    }
    println!("Repository: {}", repo.location());
    Ok(())
}

/// Print a library's files
async fn list_files(repo: &dyn LibraryRepository, name: &str) -> Result<()> {
    let library = repo.fetch(name).await?;
    for file in library.files().await? {
        println!("{:<8} {}", file.kind, file.file_name());
    }
    Ok(())
}

async fn show_layout(repo: &FileSystemLibraryRepository, name: &str) -> Result<()> {
    let layout = repo.get_library_layout(name).await?;
    println!("{}: layout {}", name, layout);
    Ok(())
}

/// Fetch `name` from `source` and publish it into the local repository
async fn install(
    source: &dyn LibraryRepository,
    target: &FileSystemLibraryRepository,
    name: &str,
    layout: LibraryLayout,
) -> Result<()> {
    let library = source
        .fetch(name)
        .await
        .with_context(|| format!("Failed to fetch '{}' from {}", name, source.location()))?;

    target
        .add(&library, layout)
        .await
        .with_context(|| format!("Failed to add '{}' to {}", name, target.location()))?;

    println!(
        "Installed {} (layout {}) into {}",
        name,
        layout,
        target.root().display()
    );
    Ok(())
}

async fn migrate(repo: &FileSystemLibraryRepository, name: &str) -> Result<()> {
    let rewritten = repo.migrate_library(name).await?;

    println!("Migrated {} to layout 2", name);
    for file in rewritten {
        println!("  rewrote includes in {}", file);
    }
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let config = config::reload_config()?;

    println!("librepo configuration");
    println!("=====================");
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("Home:        {}", config.home.display());
    println!("Libraries:   {}", config.libraries.display());
    match &config.registry {
        Some(registry) => println!(
            "Registry:    {} (timeout {}s)",
            registry.endpoint, registry.timeout_seconds
        ),
        None => println!("Registry:    (not configured)"),
    }
    Ok(())
}
