//! Repository backends for libraries.
//!
//! Callers hold an `Arc<dyn LibraryRepository>` and never depend on which
//! backend sits behind it:
//!
//! - [`FileSystemLibraryRepository`]: read-write, one subdirectory per library
//! - [`BuildLibraryRepository`]: read-only, backed by an HTTP registry

pub mod build;
pub mod error;
pub mod fs;

use async_trait::async_trait;

use crate::library::{Library, LibraryFile, LibraryLayout, LibraryMetadata, LibrarySummary};

pub use build::BuildLibraryRepository;
pub use error::{BoxError, RepositoryError, Result};
pub use fs::FileSystemLibraryRepository;

/// Capability set every library backend offers.
///
/// A backend that cannot perform an operation fails it with
/// [`RepositoryError::Unsupported`].
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Human-readable location used in errors and logs (e.g. `fs:/libs/`)
    fn location(&self) -> String;

    /// Full catalog of library summaries
    async fn index(&self) -> Result<Vec<LibrarySummary>>;

    /// Names of the available libraries, in storage order
    async fn names(&self) -> Result<Vec<String>>;

    /// Resolve a single library by name
    async fn fetch(&self, name: &str) -> Result<Library>;

    /// Descriptor record of a library previously fetched from this repository
    async fn definition(&self, library: &Library) -> Result<LibraryMetadata>;

    /// Member files of a library previously fetched from this repository
    async fn files(&self, library: &Library) -> Result<Vec<LibraryFile>>;

    /// Publish a library's descriptor and source files into this repository
    async fn add(&self, library: &Library, layout: LibraryLayout) -> Result<()> {
        let _ = (library, layout);
        Err(RepositoryError::Unsupported {
            repository: self.location(),
            operation: "add",
        })
    }
}
