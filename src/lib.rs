//! librepo - uniform access to firmware library repositories
//!
//! A library is a named, versioned unit of reusable source code. Libraries
//! live either in a local directory tree or in a remote HTTP registry; both
//! backends implement the same [`LibraryRepository`] contract, so callers can
//! list, fetch and publish without knowing where a library is stored.
//!
//! # Modules
//!
//! - `library`: Data model (Library, LibraryMetadata, LibraryFile, LibrarySummary)
//! - `repository`: The repository contract, error taxonomy and both backends
//! - `config`: Layered configuration (env, `.librepo/config.yaml`, defaults)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # List libraries in the local repository
//! librepo list
//!
//! # Install a library from the registry
//! librepo --registry http://localhost:3000/ install neopixel
//!
//! # Convert a legacy library to the current layout
//! librepo migrate neopixel
//! ```

pub mod cli;
pub mod config;
pub mod library;
pub mod repository;

// Re-export main types at crate root for convenience
pub use library::{
    FileKind, Library, LibraryFile, LibraryLayout, LibraryMetadata, LibrarySummary, Visibility,
};
pub use repository::fs::migrate::migrate_source;
pub use repository::{
    BuildLibraryRepository, FileSystemLibraryRepository, LibraryRepository, RepositoryError,
};
