//! The [`Library`] value handed out by repositories.

use std::sync::Arc;

use crate::repository::{LibraryRepository, Result};

use super::content::LibraryFile;
use super::metadata::LibraryMetadata;

/// A named library together with its descriptor and owning repository.
///
/// The repository reference is a back-pointer only: repositories never keep
/// the libraries they hand out.
#[derive(Clone)]
pub struct Library {
    name: String,
    metadata: LibraryMetadata,
    repository: Arc<dyn LibraryRepository>,
}

impl Library {
    pub fn new(
        name: impl Into<String>,
        metadata: LibraryMetadata,
        repository: Arc<dyn LibraryRepository>,
    ) -> Self {
        Self {
            name: name.into(),
            metadata,
            repository,
        }
    }

    /// The library's name within its repository
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor materialized when the library was fetched
    pub fn metadata(&self) -> &LibraryMetadata {
        &self.metadata
    }

    pub fn repository(&self) -> &Arc<dyn LibraryRepository> {
        &self.repository
    }

    /// Resolve the descriptor through the owning repository
    pub async fn definition(&self) -> Result<LibraryMetadata> {
        self.repository.definition(self).await
    }

    /// Resolve the library's files through the owning repository
    pub async fn files(&self) -> Result<Vec<LibraryFile>> {
        self.repository.files(self).await
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("repository", &self.repository.location())
            .finish()
    }
}
