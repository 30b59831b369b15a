//! Filesystem-backed library repository.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//! └── <library name>/
//!     ├── library.properties    # layout 2 descriptor (key: value)
//!     ├── spark.json            # layout 1 descriptor (JSON), legacy
//!     ├── <name>.cpp            # sources, flat
//!     ├── <name>.h
//!     └── <library name>/       # layout 1 only: sources nested under the name
//! ```
//!
//! `names()` only recognises layout 2 libraries, while
//! [`FileSystemLibraryRepository::get_library_layout`] recognises both.
//! `fetch()` reads the layout 2 descriptor only.

pub mod descriptor;
pub mod migrate;
pub mod scan;

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::fs;
use tracing::{debug, info};

use crate::library::{
    split_file_name, FileKind, Library, LibraryFile, LibraryLayout, LibraryMetadata,
    LibrarySummary, Visibility,
};

use self::descriptor::{
    build_v1_descriptor, build_v2_descriptor, parse_v1_descriptor, parse_v2_descriptor,
    LIBRARY_PROPERTIES, SPARK_JSON,
};
use self::migrate::{is_migratable_extension, migrate_source};
use self::scan::{
    getdirs, is_directory, is_regular_file, map_action_dir, remove_failed_predicate, walk_files,
};
use super::{LibraryRepository, RepositoryError, Result};

/// Repository storing each library as a subdirectory of a root directory.
///
/// Cloning is cheap; clones share the same root.
#[derive(Debug, Clone)]
pub struct FileSystemLibraryRepository {
    inner: Arc<FsInner>,
}

#[derive(Debug)]
struct FsInner {
    root: PathBuf,
}

impl FileSystemLibraryRepository {
    /// Open a repository rooted at `root`. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FsInner {
                root: normalize_root(root.into()),
            }),
        }
    }

    /// Root directory, always ending with a separator
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Directory holding the named library.
    ///
    /// Returns `None` for names that cannot be a single directory name.
    pub fn directory(&self, name: &str) -> Option<PathBuf> {
        name_to_fs(name).map(|dir| self.inner.root.join(dir))
    }

    /// Path of the layout 1 descriptor for `name`
    pub fn descriptor_file_v1(&self, name: &str) -> Option<PathBuf> {
        self.directory(name).map(|dir| dir.join(SPARK_JSON))
    }

    /// Path of the layout 2 descriptor for `name`
    pub fn descriptor_file_v2(&self, name: &str) -> Option<PathBuf> {
        self.directory(name).map(|dir| dir.join(LIBRARY_PROPERTIES))
    }

    fn existing_directory(&self, name: &str) -> Result<PathBuf> {
        self.directory(name)
            .ok_or_else(|| RepositoryError::not_found(self.location(), name))
    }

    fn handle(&self) -> Arc<dyn LibraryRepository> {
        Arc::new(self.clone())
    }

    /// Determine which descriptor layout a library uses.
    ///
    /// The legacy descriptor is probed first, so it wins when both exist.
    pub async fn get_library_layout(&self, name: &str) -> Result<LibraryLayout> {
        let dir = self.existing_directory(name)?;

        if !is_directory(&dir).await {
            return Err(RepositoryError::not_found(self.location(), name));
        }

        if is_regular_file(&dir.join(SPARK_JSON)).await {
            Ok(LibraryLayout::V1)
        } else if is_regular_file(&dir.join(LIBRARY_PROPERTIES)).await {
            Ok(LibraryLayout::V2)
        } else {
            Err(RepositoryError::not_found(self.location(), name))
        }
    }

    /// Read and validate the layout 2 descriptor of `name`.
    ///
    /// Fails with a format error when the file cannot be read as text or
    /// declares a different name.
    pub async fn read_descriptor_v2(&self, name: &str) -> Result<LibraryMetadata> {
        let path = self
            .descriptor_file_v2(name)
            .ok_or_else(|| RepositoryError::not_found(self.location(), name))?;

        let content = fs::read_to_string(&path).await.map_err(|e| {
            RepositoryError::format_because(
                self.location(),
                name,
                format!("error reading \"{}\"", path.display()),
                e,
            )
        })?;

        let metadata = parse_v2_descriptor(&content);
        self.check_name(name, metadata)
    }

    /// Read and validate the layout 1 descriptor of `name`.
    pub async fn read_descriptor_v1(&self, name: &str) -> Result<LibraryMetadata> {
        let path = self
            .descriptor_file_v1(name)
            .ok_or_else(|| RepositoryError::not_found(self.location(), name))?;

        let content = fs::read_to_string(&path).await.map_err(|e| {
            RepositoryError::format_because(
                self.location(),
                name,
                format!("error reading \"{}\"", path.display()),
                e,
            )
        })?;

        let metadata = parse_v1_descriptor(&content).map_err(|e| {
            RepositoryError::format_because(
                self.location(),
                name,
                format!("error parsing \"{}\"", path.display()),
                e,
            )
        })?;
        self.check_name(name, metadata)
    }

    /// Read the descriptor in whichever layout the library uses
    pub async fn read_descriptor(&self, name: &str) -> Result<LibraryMetadata> {
        match self.get_library_layout(name).await? {
            LibraryLayout::V1 => self.read_descriptor_v1(name).await,
            LibraryLayout::V2 => self.read_descriptor_v2(name).await,
        }
    }

    fn check_name(&self, name: &str, metadata: LibraryMetadata) -> Result<LibraryMetadata> {
        if metadata.name != name {
            return Err(RepositoryError::format(
                self.location(),
                name,
                format!(
                    "name in descriptor ('{}') does not match directory name",
                    metadata.name
                ),
            ));
        }
        Ok(metadata)
    }

    /// Write the descriptor for `name` in the given layout
    pub async fn write_descriptor(
        &self,
        name: &str,
        metadata: &LibraryMetadata,
        layout: LibraryLayout,
    ) -> Result<PathBuf> {
        let (path, content) = match layout {
            LibraryLayout::V1 => {
                let content = build_v1_descriptor(metadata).map_err(|e| {
                    RepositoryError::format_because(
                        self.location(),
                        name,
                        "descriptor cannot be serialized",
                        e,
                    )
                })?;
                (self.descriptor_file_v1(name), content)
            }
            LibraryLayout::V2 => (self.descriptor_file_v2(name), build_v2_descriptor(metadata)),
        };
        let path = path.ok_or_else(|| invalid_name(self, name))?;

        fs::write(&path, content).await?;
        debug!(library = name, %layout, "Wrote descriptor {}", path.display());
        Ok(path)
    }

    /// Copy one library file into the named library's directory
    pub async fn copy_library_file(&self, name: &str, file: &LibraryFile) -> Result<PathBuf> {
        let dir = self.directory(name).ok_or_else(|| invalid_name(self, name))?;
        let file_name = file.file_name();
        let relative =
            contained_path(&file_name).ok_or_else(|| escaping_file(self, name, &file_name))?;
        let target = dir.join(relative);

        if let Some(parent) = target.parent() {
            ensure_directory(parent).await?;
        }

        let mut output = fs::File::create(&target).await?;
        let bytes = file.write_to(&mut output).await?;
        debug!(library = name, bytes, "Copied {}", target.display());
        Ok(target)
    }

    /// Convert a layout 1 library to layout 2 in place.
    ///
    /// Rewrites the includes of every top-level C/C++ source, moves the
    /// contents of the legacy `<name>/<name>/` source directory up into the
    /// library directory (rewriting sources on the way), writes
    /// `library.properties` from `spark.json` and removes `spark.json`.
    /// Returns the paths, relative to the library directory, of the files
    /// whose includes were rewritten.
    ///
    /// Fails without touching anything when a moved file would overwrite an
    /// existing one.
    pub async fn migrate_library(&self, name: &str) -> Result<Vec<String>> {
        if self.get_library_layout(name).await? != LibraryLayout::V1 {
            return Err(RepositoryError::format(
                self.location(),
                name,
                "library is not in layout 1",
            ));
        }

        let metadata = self.read_descriptor_v1(name).await?;
        let dir = self.existing_directory(name)?;
        let nested = dir.join(name);

        let nested_files = if is_directory(&nested).await {
            walk_files(&nested).await?
        } else {
            Vec::new()
        };
        for relative in &nested_files {
            let clashes = relative.as_path() == Path::new(LIBRARY_PROPERTIES)
                || relative.as_path() == Path::new(SPARK_JSON)
                || fs::try_exists(dir.join(relative)).await?;
            if clashes {
                return Err(RepositoryError::format(
                    self.location(),
                    name,
                    format!(
                        "moving \"{}\" out of the legacy source directory would overwrite a file",
                        relative.display()
                    ),
                ));
            }
        }

        let top_level = map_action_dir(
            &dir,
            |meta, entry| meta.is_file() && is_migratable_extension(split_file_name(entry).1),
            |entries, predicates| remove_failed_predicate(entries, &predicates),
        )
        .await?;

        let mut rewritten = Vec::new();
        for file_name in top_level {
            let path = dir.join(&file_name);
            let source = self.read_source(name, &path).await?;
            if let Cow::Owned(migrated) = migrate_source(&source, name) {
                fs::write(&path, migrated).await?;
                rewritten.push(file_name);
            }
        }

        for relative in &nested_files {
            let from = nested.join(relative);
            let to = dir.join(relative);
            if let Some(parent) = to.parent() {
                ensure_directory(parent).await?;
            }

            let migratable = relative
                .file_name()
                .and_then(|file_name| file_name.to_str())
                .map(|file_name| is_migratable_extension(split_file_name(file_name).1))
                .unwrap_or(false);
            if migratable {
                let source = self.read_source(name, &from).await?;
                if let Cow::Owned(migrated) = migrate_source(&source, name) {
                    fs::write(&to, migrated).await?;
                    fs::remove_file(&from).await?;
                    rewritten.push(relative.display().to_string());
                    continue;
                }
            }
            fs::rename(&from, &to).await?;
            debug!(library = name, "Moved {} to {}", from.display(), to.display());
        }

        if is_directory(&nested).await {
            fs::remove_dir_all(&nested).await?;
        }

        self.write_descriptor(name, &metadata, LibraryLayout::V2).await?;
        fs::remove_file(dir.join(SPARK_JSON)).await?;

        info!(
            library = name,
            moved = nested_files.len(),
            rewritten = rewritten.len(),
            "Migrated library to layout 2"
        );
        Ok(rewritten)
    }

    async fn read_source(&self, name: &str, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(|e| {
            RepositoryError::format_because(
                self.location(),
                name,
                format!("error reading \"{}\"", path.display()),
                e,
            )
        })
    }
}

#[async_trait]
impl LibraryRepository for FileSystemLibraryRepository {
    fn location(&self) -> String {
        format!("fs:{}", self.inner.root.display())
    }

    async fn index(&self) -> Result<Vec<LibrarySummary>> {
        let names = self.names().await?;
        let libraries = try_join_all(names.iter().map(|name| self.fetch(name))).await?;

        Ok(libraries
            .into_iter()
            .map(|library| {
                let metadata = library.metadata();
                LibrarySummary {
                    id: library.name().to_string(),
                    title: library.name().to_string(),
                    content: metadata.description.clone().unwrap_or_default(),
                    version: metadata.version.clone().unwrap_or_default(),
                    visibility: Visibility::Public,
                }
            })
            .collect())
    }

    async fn names(&self) -> Result<Vec<String>> {
        let dirs = getdirs(&self.inner.root).await?;

        let probes = dirs.iter().map(|dir| {
            let descriptor = self.inner.root.join(dir).join(LIBRARY_PROPERTIES);
            async move { is_regular_file(&descriptor).await }
        });
        let is_library = futures::future::join_all(probes).await;

        Ok(remove_failed_predicate(dirs, &is_library))
    }

    async fn fetch(&self, name: &str) -> Result<Library> {
        match self.read_descriptor_v2(name).await {
            Ok(metadata) => Ok(Library::new(name, metadata, self.handle())),
            Err(e) => {
                debug!(library = name, "Fetch failed: {}", e);
                Err(RepositoryError::not_found_because(self.location(), name, e))
            }
        }
    }

    async fn definition(&self, library: &Library) -> Result<LibraryMetadata> {
        // materialized at fetch time
        Ok(library.metadata().clone())
    }

    async fn files(&self, library: &Library) -> Result<Vec<LibraryFile>> {
        let dir = self.existing_directory(library.name())?;

        let included = map_action_dir(
            &dir,
            |meta, entry| meta.is_file() && is_source_file_name(entry),
            |entries, predicates| remove_failed_predicate(entries, &predicates),
        )
        .await?;

        Ok(included
            .into_iter()
            .map(|file_name| {
                let (base, extension) = split_file_name(&file_name);
                LibraryFile::on_disk(dir.join(&file_name), base, FileKind::Source, extension)
            })
            .collect())
    }

    async fn add(&self, library: &Library, layout: LibraryLayout) -> Result<()> {
        let name = library.name();
        let dir = self.directory(name).ok_or_else(|| invalid_name(self, name))?;

        let definition = library.definition().await?;
        let files = library.files().await?;
        let sources: Vec<&LibraryFile> = files.iter().filter(|file| file.is_source()).collect();
        if let Some(file) = sources
            .iter()
            .find(|file| contained_path(&file.file_name()).is_none())
        {
            return Err(escaping_file(self, name, &file.file_name()));
        }

        if !fs::try_exists(&dir).await? {
            fs::create_dir(&dir).await?;
        }
        self.write_descriptor(name, &definition, layout).await?;

        let copies = sources
            .iter()
            .map(|file| self.copy_library_file(name, file));
        let copied = try_join_all(copies).await?;

        info!(library = name, %layout, files = copied.len(), "Added library to {}", self.location());
        Ok(())
    }
}

/// Map a library name onto a directory name.
///
/// Empty names, `.`/`..` and names containing a path separator have no
/// directory.
pub fn name_to_fs(name: &str) -> Option<&str> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    (!invalid).then_some(name)
}

/// Interpret a library file name as a path below the library directory.
///
/// Returns `None` for empty names and for names with a root, a drive prefix
/// or a `..` component. `.` components are dropped.
pub fn contained_path(file_name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(file_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// Descriptor files are not library sources
fn is_source_file_name(file_name: &str) -> bool {
    file_name != LIBRARY_PROPERTIES && file_name != SPARK_JSON
}

/// Create `dir` and any missing ancestors.
///
/// Walks up to the first existing ancestor, then creates directories on the
/// way back down. A directory created concurrently is not an error.
pub async fn ensure_directory(dir: &Path) -> std::io::Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir);

    while let Some(path) = current {
        if path.as_os_str().is_empty() || fs::try_exists(path).await? {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }

    for path in missing.iter().rev() {
        match fs::create_dir(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn normalize_root(root: PathBuf) -> PathBuf {
    let mut raw = root.into_os_string();
    let ends_with_separator = raw
        .to_str()
        .map(|s| s.ends_with(std::path::MAIN_SEPARATOR) || s.ends_with('/'))
        .unwrap_or(false);
    if !ends_with_separator {
        raw.push(std::path::MAIN_SEPARATOR_STR);
    }
    PathBuf::from(raw)
}

fn escaping_file(
    repo: &FileSystemLibraryRepository,
    name: &str,
    file_name: &str,
) -> RepositoryError {
    RepositoryError::format(
        repo.location(),
        name,
        format!("file name \"{}\" leaves the library directory", file_name),
    )
}

fn invalid_name(repo: &FileSystemLibraryRepository, name: &str) -> RepositoryError {
    RepositoryError::format(
        repo.location(),
        name,
        "library name is not a valid directory name",
    )
}
