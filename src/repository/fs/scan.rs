//! Directory scanning with concurrent per-entry probes.
//!
//! Every entry of a directory is stat'ed concurrently, a predicate is
//! evaluated per entry, and the results are zipped back positionally with
//! the entry list before an aggregation runs. Entry order is the order the
//! directory was enumerated in.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tokio::fs;
use tokio::io;

/// Scan `root`, evaluate `probe` for every entry, then hand the entry names
/// and the index-aligned predicate results to `action`.
///
/// An entry whose stat fails (dangling link, permission denied, removed
/// mid-scan) gets a `false` predicate result instead of aborting the scan.
/// Failing to list `root` itself is an error.
pub async fn map_action_dir<P, A, T>(root: &Path, probe: P, action: A) -> io::Result<T>
where
    P: Fn(&Metadata, &str) -> bool,
    A: FnOnce(Vec<String>, Vec<bool>) -> T,
{
    let entries = list_entries(root).await?;

    let probes = entries.iter().map(|name| {
        let path = root.join(name);
        async move { fs::metadata(&path).await }
    });
    let stats = join_all(probes).await;

    let predicates = entries
        .iter()
        .zip(stats)
        .map(|(name, stat)| match stat {
            Ok(meta) => probe(&meta, name),
            Err(e) => {
                tracing::debug!("Excluding {} from scan of {}: {}", name, root.display(), e);
                false
            }
        })
        .collect();

    Ok(action(entries, predicates))
}

/// Keep the items whose index-aligned predicate is `true`.
pub fn remove_failed_predicate<T>(items: Vec<T>, predicates: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| predicates.get(*i).copied().unwrap_or(false))
        .map(|(_, item)| item)
        .collect()
}

/// Names of the immediate subdirectories of `root`.
pub async fn getdirs(root: &Path) -> io::Result<Vec<String>> {
    map_action_dir(
        root,
        |meta, _| meta.is_dir(),
        |entries, predicates| remove_failed_predicate(entries, &predicates),
    )
    .await
}

/// Whether `path` exists and is a regular file; any stat failure counts as no.
pub async fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Whether `path` exists and is a directory; any stat failure counts as no.
pub async fn is_directory(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Paths, relative to `root`, of every regular file below `root`.
///
/// Entries whose stat fails are skipped, as in [`map_action_dir`].
pub async fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        let dir = root.join(&relative);
        let found = map_action_dir(
            &dir,
            |meta, _| meta.is_file(),
            |entries, predicates| remove_failed_predicate(entries, &predicates),
        )
        .await?;
        files.extend(found.into_iter().map(|name| relative.join(name)));

        let subdirs = getdirs(&dir).await?;
        pending.extend(subdirs.into_iter().map(|name| relative.join(name)));
    }

    Ok(files)
}

async fn list_entries(root: &Path) -> io::Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(root).await?;

    while let Some(entry) = dir.next_entry().await? {
        match entry.file_name().into_string() {
            Ok(name) => entries.push(name),
            Err(raw) => {
                tracing::warn!("Skipping non UTF-8 entry {:?} in {}", raw, root.display());
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_failed_predicate_is_positional() {
        let items = vec!["a", "b", "c", "d"];
        let kept = remove_failed_predicate(items, &[true, false, true, false]);
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[test]
    fn test_remove_failed_predicate_short_predicates() {
        let kept = remove_failed_predicate(vec![1, 2, 3], &[true]);
        assert_eq!(kept, vec![1]);
    }

    #[tokio::test]
    async fn test_getdirs_only_returns_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("alpha")).unwrap();
        std::fs::create_dir(temp.path().join("beta")).unwrap();
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let mut dirs = getdirs(temp.path()).await.unwrap();
        dirs.sort();

        assert_eq!(dirs, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_predicates_align_with_entries() {
        let temp = TempDir::new().unwrap();
        for name in ["one.c", "two.h", "three.txt"] {
            std::fs::write(temp.path().join(name), name).unwrap();
        }

        let pairs = map_action_dir(
            temp.path(),
            |_, name| name.ends_with(".c") || name.ends_with(".h"),
            |entries, predicates| entries.into_iter().zip(predicates).collect::<Vec<_>>(),
        )
        .await
        .unwrap();

        assert_eq!(pairs.len(), 3);
        for (name, included) in pairs {
            assert_eq!(included, name != "three.txt", "entry {}", name);
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = getdirs(&temp.path().join("missing")).await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_walk_files_is_relative_and_recursive() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("src").join("util");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(temp.path().join("empty")).unwrap();
        std::fs::write(temp.path().join("top.h"), "").unwrap();
        std::fs::write(nested.join("deep.cpp"), "").unwrap();

        let mut files = walk_files(temp.path()).await.unwrap();
        files.sort();

        assert_eq!(
            files,
            vec![
                PathBuf::from("src").join("util").join("deep.cpp"),
                PathBuf::from("top.h"),
            ]
        );
        assert!(is_directory(&temp.path().join("empty")).await);
        assert!(!is_directory(&temp.path().join("top.h")).await);
    }

    #[tokio::test]
    async fn test_is_regular_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f"), "").unwrap();

        assert!(is_regular_file(&temp.path().join("f")).await);
        assert!(!is_regular_file(temp.path()).await);
        assert!(!is_regular_file(&temp.path().join("nope")).await);
    }
}
