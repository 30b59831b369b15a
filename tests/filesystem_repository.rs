//! Filesystem Repository Integration Tests
//!
//! Tests for publishing, fetching, enumeration, layout detection and
//! migration against scratch directories.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use librepo::repository::fs::descriptor::{LIBRARY_PROPERTIES, SPARK_JSON};
use librepo::repository::Result;
use librepo::{
    FileKind, FileSystemLibraryRepository, Library, LibraryFile, LibraryLayout, LibraryMetadata,
    LibraryRepository, LibrarySummary, RepositoryError,
};
use tempfile::TempDir;

/// Read-only repository serving one library from memory
struct StaticRepository {
    metadata: LibraryMetadata,
    files: Vec<LibraryFile>,
}

#[async_trait]
impl LibraryRepository for StaticRepository {
    fn location(&self) -> String {
        "static:".to_string()
    }

    async fn index(&self) -> Result<Vec<LibrarySummary>> {
        Err(RepositoryError::Unsupported {
            repository: self.location(),
            operation: "index",
        })
    }

    async fn names(&self) -> Result<Vec<String>> {
        Ok(vec![self.metadata.name.clone()])
    }

    async fn fetch(&self, name: &str) -> Result<Library> {
        Err(RepositoryError::not_found(self.location(), name))
    }

    async fn definition(&self, _library: &Library) -> Result<LibraryMetadata> {
        Ok(self.metadata.clone())
    }

    async fn files(&self, _library: &Library) -> Result<Vec<LibraryFile>> {
        Ok(self.files.clone())
    }
}

fn authored(metadata: LibraryMetadata, files: Vec<LibraryFile>) -> Library {
    let name = metadata.name.clone();
    let repo = Arc::new(StaticRepository {
        metadata: metadata.clone(),
        files,
    });
    Library::new(name, metadata, repo)
}

fn full_metadata(name: &str) -> LibraryMetadata {
    LibraryMetadata::new(name)
        .with_version("1.2.3")
        .with_author("Borges")
        .with_license("LGPL-3.0")
        .with_description("A library of Babel")
}

fn make_v2(root: &Path, name: &str, descriptor: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(LIBRARY_PROPERTIES), descriptor).unwrap();
}

fn make_v1(root: &Path, name: &str, descriptor: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(SPARK_JSON), descriptor).unwrap();
}

async fn sorted_names(repo: &FileSystemLibraryRepository) -> Vec<String> {
    let mut names = repo.names().await.unwrap();
    names.sort();
    names
}

#[tokio::test]
async fn test_fetch_unknown_library_is_not_found() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "present", "name: present");
    let repo = FileSystemLibraryRepository::new(temp.path());

    for name in ["absent", "$$!!@@", "present/..", ""] {
        let err = repo.fetch(name).await.unwrap_err();
        assert_eq!(err.kind(), "LibraryNotFoundError", "fetching {:?}", name);
    }

    assert!(repo.fetch("present").await.is_ok());
}

#[tokio::test]
async fn test_fetch_reads_layout_2_descriptor() {
    let temp = TempDir::new().unwrap();
    make_v2(
        temp.path(),
        "neopixel",
        "name: neopixel\nversion: 0.0.10\nauthor: Adafruit\nsentence: LED strip driver\n",
    );
    let repo = FileSystemLibraryRepository::new(temp.path());

    let library = repo.fetch("neopixel").await.unwrap();
    assert_eq!(library.name(), "neopixel");

    let definition = library.definition().await.unwrap();
    assert_eq!(definition.version.as_deref(), Some("0.0.10"));
    assert_eq!(definition.author.as_deref(), Some("Adafruit"));
    assert_eq!(definition.description.as_deref(), Some("LED strip driver"));
    assert_eq!(definition.license, None);
}

#[tokio::test]
async fn test_add_then_fetch_round_trips_definition() {
    let temp = TempDir::new().unwrap();
    let repo = FileSystemLibraryRepository::new(temp.path());
    let metadata = full_metadata("babel").with_id("registry-7");
    let library = authored(
        metadata.clone(),
        vec![LibraryFile::inline(
            "babel.cpp",
            FileKind::Source,
            b"#include \"babel.h\"\n".to_vec(),
        )],
    );

    repo.add(&library, LibraryLayout::V2).await.unwrap();

    let fetched = repo.fetch("babel").await.unwrap();
    let definition = fetched.definition().await.unwrap();
    assert_eq!(definition.name, metadata.name);
    assert_eq!(definition.version, metadata.version);
    assert_eq!(definition.author, metadata.author);
    assert_eq!(definition.license, metadata.license);
    assert_eq!(definition.description, metadata.description);
    assert_eq!(definition.id, None);

    let descriptor = std::fs::read_to_string(temp.path().join("babel").join(LIBRARY_PROPERTIES))
        .unwrap();
    assert_eq!(
        descriptor,
        "name: babel\nversion: 1.2.3\nlicense: LGPL-3.0\nauthor: Borges\nsentence: A library of Babel"
    );
}

#[tokio::test]
async fn test_add_copies_only_source_files() {
    let temp = TempDir::new().unwrap();
    let repo = FileSystemLibraryRepository::new(temp.path());
    let library = authored(
        LibraryMetadata::new("blink").with_version("1.0.0"),
        vec![
            LibraryFile::inline("blink.cpp", FileKind::Source, b"void blink() {}".to_vec()),
            LibraryFile::inline("blink.h", FileKind::Source, b"void blink();".to_vec()),
            LibraryFile::inline("demo.ino", FileKind::Example, b"blink();".to_vec()),
            LibraryFile::inline("logo.png", FileKind::Other, vec![0x89, 0x50]),
        ],
    );

    repo.add(&library, LibraryLayout::V2).await.unwrap();

    let dir = temp.path().join("blink");
    assert_eq!(
        std::fs::read_to_string(dir.join("blink.cpp")).unwrap(),
        "void blink() {}"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("blink.h")).unwrap(),
        "void blink();"
    );
    assert!(!dir.join("demo.ino").exists());
    assert!(!dir.join("logo.png").exists());
}

#[tokio::test]
async fn test_add_creates_intermediate_directories_for_files() {
    let temp = TempDir::new().unwrap();
    let repo = FileSystemLibraryRepository::new(temp.path());
    let library = authored(
        LibraryMetadata::new("nested"),
        vec![LibraryFile::inline(
            "src/util/helpers.cpp",
            FileKind::Source,
            b"// helpers".to_vec(),
        )],
    );

    repo.add(&library, LibraryLayout::V2).await.unwrap();

    let copied = temp
        .path()
        .join("nested")
        .join("src")
        .join("util")
        .join("helpers.cpp");
    assert_eq!(std::fs::read_to_string(copied).unwrap(), "// helpers");
}

#[tokio::test]
async fn test_add_between_filesystem_repositories() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    make_v2(
        source_dir.path(),
        "swd",
        "name: swd\nversion: 0.1.0\nlicense: MIT",
    );
    std::fs::write(source_dir.path().join("swd").join("swd.cpp"), "int swd;").unwrap();
    std::fs::write(source_dir.path().join("swd").join("swd.h"), "extern int swd;").unwrap();

    let source = FileSystemLibraryRepository::new(source_dir.path());
    let target = FileSystemLibraryRepository::new(target_dir.path());

    let library = source.fetch("swd").await.unwrap();
    target.add(&library, LibraryLayout::V2).await.unwrap();

    let copied = target.fetch("swd").await.unwrap();
    assert_eq!(copied.definition().await.unwrap(), library.definition().await.unwrap());

    let mut files: Vec<String> = copied
        .files()
        .await
        .unwrap()
        .iter()
        .map(|f| f.file_name())
        .collect();
    files.sort();
    assert_eq!(files, vec!["swd.cpp", "swd.h"]);
    assert_eq!(
        std::fs::read_to_string(target_dir.path().join("swd").join("swd.h")).unwrap(),
        "extern int swd;"
    );
}

#[tokio::test]
async fn test_add_layout_1_writes_json_without_id() {
    let temp = TempDir::new().unwrap();
    let repo = FileSystemLibraryRepository::new(temp.path());
    let library = authored(full_metadata("legacy").with_id("abc"), Vec::new());

    repo.add(&library, LibraryLayout::V1).await.unwrap();

    let json = std::fs::read_to_string(temp.path().join("legacy").join(SPARK_JSON)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value.get("id").is_none());
    assert_eq!(value["name"], "legacy");
    assert_eq!(value["version"], "1.2.3");

    assert_eq!(
        repo.get_library_layout("legacy").await.unwrap(),
        LibraryLayout::V1
    );
    let definition = repo.read_descriptor("legacy").await.unwrap();
    assert_eq!(definition, full_metadata("legacy"));
}

#[tokio::test]
async fn test_names_only_lists_current_layout_libraries() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "current", "name: current");
    make_v2(temp.path(), "another", "name: another");
    make_v1(temp.path(), "legacy", r#"{"name":"legacy"}"#);
    std::fs::create_dir(temp.path().join("empty")).unwrap();
    std::fs::create_dir_all(temp.path().join("odd").join(LIBRARY_PROPERTIES)).unwrap();
    std::fs::write(temp.path().join("stray.txt"), "not a library").unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());

    assert_eq!(sorted_names(&repo).await, vec!["another", "current"]);

    // enumeration skips legacy libraries, layout detection does not
    assert_eq!(
        repo.get_library_layout("legacy").await.unwrap(),
        LibraryLayout::V1
    );
    assert!(repo.fetch("legacy").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_names_on_missing_root_is_io_error() {
    let temp = TempDir::new().unwrap();
    let repo = FileSystemLibraryRepository::new(temp.path().join("missing"));

    let err = repo.names().await.unwrap_err();
    assert_eq!(err.kind(), "IoError");
}

#[cfg(unix)]
#[tokio::test]
async fn test_scan_excludes_entries_whose_probe_fails() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "a", "name: a");
    make_v2(temp.path(), "c", "name: c");
    std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("b")).unwrap();

    let lib_dir = temp.path().join("a");
    std::fs::write(lib_dir.join("a.cpp"), "int a;").unwrap();
    std::os::unix::fs::symlink(lib_dir.join("gone.h"), lib_dir.join("broken.h")).unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());
    assert_eq!(sorted_names(&repo).await, vec!["a", "c"]);

    let library = repo.fetch("a").await.unwrap();
    let files: Vec<String> = library
        .files()
        .await
        .unwrap()
        .iter()
        .map(|f| f.file_name())
        .collect();
    assert_eq!(files, vec!["a.cpp"]);
}

#[tokio::test]
async fn test_layout_detection() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "modern", "name: modern");
    make_v1(temp.path(), "legacy", r#"{"name":"legacy"}"#);
    make_v1(temp.path(), "both", r#"{"name":"both"}"#);
    std::fs::write(temp.path().join("both").join(LIBRARY_PROPERTIES), "name: both").unwrap();
    std::fs::create_dir(temp.path().join("bare")).unwrap();
    std::fs::write(temp.path().join("file"), "").unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());

    assert_eq!(repo.get_library_layout("modern").await.unwrap(), LibraryLayout::V2);
    assert_eq!(repo.get_library_layout("legacy").await.unwrap(), LibraryLayout::V1);
    assert_eq!(repo.get_library_layout("both").await.unwrap(), LibraryLayout::V1);

    for name in ["bare", "file", "missing"] {
        let err = repo.get_library_layout(name).await.unwrap_err();
        assert!(err.is_not_found(), "layout of {:?}", name);
    }
}

#[tokio::test]
async fn test_descriptor_name_mismatch_is_format_error() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "dir-name", "name: other-name\nversion: 1.0.0");
    let repo = FileSystemLibraryRepository::new(temp.path());

    let err = repo.read_descriptor_v2("dir-name").await.unwrap_err();
    assert_eq!(err.kind(), "LibraryFormatError");
    assert_eq!(err.library_name(), Some("dir-name"));

    // a descriptor without a name never matches either
    make_v2(temp.path(), "anonymous", "version: 1.0.0");
    assert!(repo.read_descriptor_v2("anonymous").await.unwrap_err().is_format());
}

#[tokio::test]
async fn test_files_lists_regular_non_descriptor_files() {
    let temp = TempDir::new().unwrap();
    make_v2(temp.path(), "lib", "name: lib");
    let dir = temp.path().join("lib");
    std::fs::write(dir.join("lib.cpp"), "").unwrap();
    std::fs::write(dir.join("lib.h"), "").unwrap();
    std::fs::write(dir.join("LICENSE"), "").unwrap();
    std::fs::create_dir(dir.join("examples")).unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());
    let library = repo.fetch("lib").await.unwrap();

    let mut files = library.files().await.unwrap();
    files.sort_by_key(|f| f.file_name());

    let shapes: Vec<(String, String, FileKind)> = files
        .iter()
        .map(|f| (f.name.clone(), f.extension.clone(), f.kind))
        .collect();
    assert_eq!(
        shapes,
        vec![
            ("LICENSE".to_string(), "".to_string(), FileKind::Source),
            ("lib".to_string(), "cpp".to_string(), FileKind::Source),
            ("lib".to_string(), "h".to_string(), FileKind::Source),
        ]
    );
    for file in &files {
        assert!(file.path().unwrap().starts_with(&dir));
    }
}

#[tokio::test]
async fn test_index_summarises_libraries() {
    let temp = TempDir::new().unwrap();
    make_v2(
        temp.path(),
        "swd",
        "name: swd\nversion: 0.1.0\nsentence: Serial wire debug",
    );
    make_v2(temp.path(), "bare", "name: bare");

    let repo = FileSystemLibraryRepository::new(temp.path());
    let mut index = repo.index().await.unwrap();
    index.sort_by(|a, b| a.title.cmp(&b.title));

    assert_eq!(index.len(), 2);
    assert_eq!(index[0].title, "bare");
    assert_eq!(index[0].version, "");
    assert_eq!(index[1].id, "swd");
    assert_eq!(index[1].content, "Serial wire debug");
    assert_eq!(index[1].visibility, librepo::Visibility::Public);
}

#[tokio::test]
async fn test_migrate_library_converts_layout_and_includes() {
    let temp = TempDir::new().unwrap();
    make_v1(
        temp.path(),
        "mylib",
        r#"{"name":"mylib","version":"0.2.0","description":"Legacy lib"}"#,
    );
    let dir = temp.path().join("mylib");
    std::fs::write(
        dir.join("mylib.cpp"),
        "#include \"mylib/mylib.h\"\n#include \"otherlib/other.h\"\n",
    )
    .unwrap();
    std::fs::write(dir.join("mylib.h"), "#pragma once\n").unwrap();
    std::fs::write(dir.join("notes.txt"), "#include \"mylib/mylib.h\"\n").unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());
    let rewritten = repo.migrate_library("mylib").await.unwrap();

    assert_eq!(rewritten, vec!["mylib.cpp"]);
    assert_eq!(
        std::fs::read_to_string(dir.join("mylib.cpp")).unwrap(),
        "#include \"mylib.h\"\n#include \"otherlib/other.h\"\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("notes.txt")).unwrap(),
        "#include \"mylib/mylib.h\"\n"
    );
    assert!(!dir.join(SPARK_JSON).exists());
    assert_eq!(repo.get_library_layout("mylib").await.unwrap(), LibraryLayout::V2);
    assert_eq!(sorted_names(&repo).await, vec!["mylib"]);

    let definition = repo.fetch("mylib").await.unwrap().definition().await.unwrap();
    assert_eq!(definition.version.as_deref(), Some("0.2.0"));
    assert_eq!(definition.description.as_deref(), Some("Legacy lib"));
}

#[tokio::test]
async fn test_unsupported_operation_on_read_only_backend() {
    let library = authored(LibraryMetadata::new("ro"), Vec::new());

    let err = library
        .repository()
        .add(&library, LibraryLayout::V2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "UnsupportedOperation");
}

#[tokio::test]
async fn test_add_rejects_file_names_leaving_library_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("repo");
    std::fs::create_dir(&root).unwrap();
    let repo = FileSystemLibraryRepository::new(&root);

    let absolute = temp.path().join("absolute.cpp");
    let hostile = [
        "../../escaped.cpp".to_string(),
        "src/../../sibling.cpp".to_string(),
        absolute.to_string_lossy().into_owned(),
    ];

    for file_name in &hostile {
        let library = authored(
            LibraryMetadata::new("hostile"),
            vec![
                LibraryFile::inline("hostile.cpp", FileKind::Source, b"int ok;".to_vec()),
                LibraryFile::inline(file_name, FileKind::Source, b"int bad;".to_vec()),
            ],
        );

        let err = repo.add(&library, LibraryLayout::V2).await.unwrap_err();
        assert_eq!(err.kind(), "LibraryFormatError", "adding {:?}", file_name);
    }

    assert!(!temp.path().join("escaped.cpp").exists());
    assert!(!root.join("sibling.cpp").exists());
    assert!(!absolute.exists());
    assert!(!root.join("hostile").exists());
}

#[tokio::test]
async fn test_migrate_library_moves_nested_legacy_sources() {
    let temp = TempDir::new().unwrap();
    make_v1(temp.path(), "mylib", r#"{"name":"mylib","version":"1.0.0"}"#);
    let dir = temp.path().join("mylib");
    let nested = dir.join("mylib");
    std::fs::create_dir_all(nested.join("util")).unwrap();
    std::fs::write(
        nested.join("mylib.cpp"),
        "#include \"mylib/mylib.h\"\n#include \"mylib/util/helpers.h\"\n",
    )
    .unwrap();
    std::fs::write(nested.join("mylib.h"), "#pragma once\n").unwrap();
    std::fs::write(nested.join("util").join("helpers.h"), "#include 'mylib/mylib.h'\n").unwrap();
    std::fs::write(nested.join("NOTES"), "keep me").unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());
    let mut rewritten = repo.migrate_library("mylib").await.unwrap();
    rewritten.sort();

    let helpers = Path::new("util").join("helpers.h").display().to_string();
    let mut expected = vec!["mylib.cpp".to_string(), helpers];
    expected.sort();
    assert_eq!(rewritten, expected);

    assert!(!nested.exists());
    assert_eq!(
        std::fs::read_to_string(dir.join("mylib.cpp")).unwrap(),
        "#include \"mylib.h\"\n#include \"util/helpers.h\"\n"
    );
    assert_eq!(std::fs::read_to_string(dir.join("mylib.h")).unwrap(), "#pragma once\n");
    assert_eq!(
        std::fs::read_to_string(dir.join("util").join("helpers.h")).unwrap(),
        "#include 'mylib.h'\n"
    );
    assert_eq!(std::fs::read_to_string(dir.join("NOTES")).unwrap(), "keep me");

    let library = repo.fetch("mylib").await.unwrap();
    let mut files: Vec<String> = library
        .files()
        .await
        .unwrap()
        .iter()
        .map(|f| f.file_name())
        .collect();
    files.sort();
    assert_eq!(files, vec!["NOTES", "mylib.cpp", "mylib.h"]);
}

#[tokio::test]
async fn test_migrate_library_refuses_to_overwrite_top_level_files() {
    let temp = TempDir::new().unwrap();
    make_v1(temp.path(), "mylib", r#"{"name":"mylib"}"#);
    let dir = temp.path().join("mylib");
    std::fs::create_dir(dir.join("mylib")).unwrap();
    std::fs::write(dir.join("mylib.h"), "// top level\n").unwrap();
    std::fs::write(dir.join("mylib").join("mylib.h"), "// nested\n").unwrap();

    let repo = FileSystemLibraryRepository::new(temp.path());
    let err = repo.migrate_library("mylib").await.unwrap_err();

    assert_eq!(err.kind(), "LibraryFormatError");
    assert!(dir.join(SPARK_JSON).exists());
    assert!(!dir.join(LIBRARY_PROPERTIES).exists());
    assert_eq!(std::fs::read_to_string(dir.join("mylib.h")).unwrap(), "// top level\n");
    assert_eq!(
        std::fs::read_to_string(dir.join("mylib").join("mylib.h")).unwrap(),
        "// nested\n"
    );
}
