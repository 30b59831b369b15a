//! Library data model shared by every repository backend.
//!
//! # Shapes
//!
//! - [`Library`]: name, descriptor and a back-reference to its repository
//! - [`LibraryMetadata`]: the descriptor record (name, version, author, ...)
//! - [`LibraryFile`]: one member file with lazily produced content
//! - [`LibrarySummary`]: a catalog entry as returned by `index()`

pub mod catalog;
pub mod content;
pub mod metadata;
pub mod model;

pub use catalog::{LibrarySummary, Visibility};
pub use content::{split_file_name, FileContent, FileKind, LibraryFile};
pub use metadata::{LibraryLayout, LibraryMetadata};
pub use model::Library;
