//! Library member files and their content.
//!
//! A [`LibraryFile`] does not hold its bytes up front. Content is produced
//! on demand by [`LibraryFile::write_to`], which drains it into a sink once
//! per call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

/// Role of a file within a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Library source (copied when publishing)
    #[default]
    Source,

    /// Example sketch
    Example,

    /// Anything else (docs, assets)
    Other,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Source => write!(f, "source"),
            FileKind::Example => write!(f, "example"),
            FileKind::Other => write!(f, "other"),
        }
    }
}

/// Where a file's bytes come from
#[derive(Debug, Clone)]
pub enum FileContent {
    /// A file on the local filesystem
    Path(PathBuf),

    /// Bytes already held in memory (e.g. delivered by a registry)
    Inline(Arc<[u8]>),
}

/// A single file belonging to a library
#[derive(Debug, Clone)]
pub struct LibraryFile {
    /// Base name without extension
    pub name: String,

    pub kind: FileKind,

    /// Extension without the leading period (may be empty)
    pub extension: String,

    content: FileContent,
}

impl LibraryFile {
    /// A file backed by a path on disk
    pub fn on_disk(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        kind: FileKind,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            extension: extension.into(),
            content: FileContent::Path(path.into()),
        }
    }

    /// A file whose content is held in memory, named by its full file name
    pub fn inline(file_name: &str, kind: FileKind, bytes: impl Into<Arc<[u8]>>) -> Self {
        let (name, extension) = split_file_name(file_name);
        Self {
            name: name.to_string(),
            kind,
            extension: extension.to_string(),
            content: FileContent::Inline(bytes.into()),
        }
    }

    /// File name with extension re-attached
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    /// Absolute path for files that live on disk
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Path(path) => Some(path),
            FileContent::Inline(_) => None,
        }
    }

    pub fn is_source(&self) -> bool {
        self.kind == FileKind::Source
    }

    /// Stream the file's content into `sink`, returning the number of bytes written.
    ///
    /// Each call produces the content afresh; the sink is flushed but not shut down.
    pub async fn write_to<W>(&self, sink: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let written = match &self.content {
            FileContent::Path(path) => {
                let mut source = File::open(path).await?;
                io::copy(&mut source, sink).await?
            }
            FileContent::Inline(bytes) => {
                sink.write_all(bytes).await?;
                bytes.len() as u64
            }
        };
        sink.flush().await?;
        Ok(written)
    }
}

/// Split a file name into base name and extension at the last period.
///
/// Without a period the whole name is the base and the extension is empty.
pub fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) => (&file_name[..idx], &file_name[idx + 1..]),
        None => (file_name, ""),
    }
}
