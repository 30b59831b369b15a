//! Read-only repository backed by an HTTP library registry.
//!
//! # Endpoints
//!
//! ```text
//! GET <endpoint>libs          -> [{id, title, content, version, visibility}, ...]
//! GET <endpoint>libs/<name>   -> {name, version, description, ..., files: [...]}
//! ```
//!
//! A missing or malformed library name is answered with a 404 (or 400/422),
//! which is reported as a not-found error rather than a transport error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::RegistrySettings;
use crate::library::{FileKind, Library, LibraryFile, LibraryMetadata, LibrarySummary};

use super::{LibraryRepository, RepositoryError, Result};

/// Default HTTP request timeout (30 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Registry-backed repository. Cloning is cheap; clones share one HTTP client.
#[derive(Debug, Clone)]
pub struct BuildLibraryRepository {
    inner: Arc<BuildInner>,
}

#[derive(Debug)]
struct BuildInner {
    endpoint: Url,
    client: reqwest::Client,
    timeout: Duration,
}

/// Single-library record as served by the registry
#[derive(Debug, Deserialize)]
struct LibraryRecord {
    #[serde(default)]
    files: Vec<RemoteFile>,

    #[serde(flatten)]
    metadata: LibraryMetadata,
}

/// A file inside a library record
#[derive(Debug, Deserialize)]
struct RemoteFile {
    /// File name including extension
    name: String,

    #[serde(default)]
    kind: FileKind,

    #[serde(default)]
    content: String,
}

impl BuildLibraryRepository {
    /// Create a repository for the registry at `endpoint`
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a repository with a custom request timeout
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("librepo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BuildInner {
                endpoint,
                client,
                timeout,
            }),
        })
    }

    /// Create from resolved registry settings
    pub fn from_settings(settings: &RegistrySettings) -> Result<Self> {
        Self::with_timeout(
            &settings.endpoint,
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// Registry base URL, always ending with `/`
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    fn catalog_url(&self) -> Result<Url> {
        self.url_for(&["libs"])
    }

    fn library_url(&self, name: &str) -> Result<Url> {
        self.url_for(&["libs", name])
    }

    /// Append percent-encoded path segments to the endpoint
    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| RepositoryError::InvalidEndpoint {
                endpoint: self.inner.endpoint.to_string(),
                reason: "endpoint cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn handle(&self) -> Arc<dyn LibraryRepository> {
        Arc::new(self.clone())
    }

    /// Fetch and decode the record for `name`
    async fn fetch_record(&self, name: &str) -> Result<LibraryRecord> {
        let url = self.library_url(name)?;
        debug!(library = name, "GET {}", url);

        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if is_absent(status) {
            debug!(library = name, %status, "Registry has no such library");
            return Err(RepositoryError::not_found_because(
                self.location(),
                name,
                format!("registry responded {}", status),
            ));
        }

        let body = response.error_for_status()?.bytes().await?;
        let record: LibraryRecord = serde_json::from_slice(&body).map_err(|e| {
            RepositoryError::format_because(
                self.location(),
                name,
                "registry record cannot be decoded",
                e,
            )
        })?;

        if record.metadata.name != name {
            return Err(RepositoryError::format(
                self.location(),
                name,
                format!(
                    "registry returned library '{}' for this name",
                    record.metadata.name
                ),
            ));
        }

        Ok(record)
    }
}

#[async_trait]
impl LibraryRepository for BuildLibraryRepository {
    fn location(&self) -> String {
        format!("build:{}", self.inner.endpoint)
    }

    async fn index(&self) -> Result<Vec<LibrarySummary>> {
        let url = self.catalog_url()?;
        debug!("GET {}", url);

        let summaries = self
            .inner
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<LibrarySummary>>()
            .await?;

        Ok(summaries)
    }

    async fn names(&self) -> Result<Vec<String>> {
        Ok(self
            .index()
            .await?
            .into_iter()
            .map(|summary| summary.title)
            .collect())
    }

    async fn fetch(&self, name: &str) -> Result<Library> {
        let record = self.fetch_record(name).await?;
        Ok(Library::new(name, record.metadata, self.handle()))
    }

    async fn definition(&self, library: &Library) -> Result<LibraryMetadata> {
        Ok(library.metadata().clone())
    }

    async fn files(&self, library: &Library) -> Result<Vec<LibraryFile>> {
        let record = self.fetch_record(library.name()).await?;

        Ok(record
            .files
            .into_iter()
            .map(|file| LibraryFile::inline(&file.name, file.kind, file.content.into_bytes()))
            .collect())
    }
}

/// Statuses the registry uses for unknown or unacceptable library names
fn is_absent(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| RepositoryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("endpoint cannot be a base URL".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let repo = BuildLibraryRepository::new("http://localhost:3000").unwrap();
        assert_eq!(repo.endpoint().as_str(), "http://localhost:3000/");

        let nested = BuildLibraryRepository::new("https://build.example.com/v1").unwrap();
        assert_eq!(nested.endpoint().as_str(), "https://build.example.com/v1/");
    }

    #[test]
    fn test_invalid_endpoints() {
        let err = BuildLibraryRepository::new("not a url").unwrap_err();
        assert_eq!(err.kind(), "InvalidEndpoint");

        let err = BuildLibraryRepository::new("ftp://example.com/").unwrap_err();
        assert_eq!(err.kind(), "InvalidEndpoint");
    }

    #[test]
    fn test_library_url_encodes_name() {
        let repo = BuildLibraryRepository::new("http://localhost:3000/api/").unwrap();

        assert_eq!(
            repo.catalog_url().unwrap().as_str(),
            "http://localhost:3000/api/libs"
        );
        assert_eq!(
            repo.library_url("swd").unwrap().as_str(),
            "http://localhost:3000/api/libs/swd"
        );

        let odd = repo.library_url("a b/c?d").unwrap();
        assert_eq!(odd.as_str(), "http://localhost:3000/api/libs/a%20b%2Fc%3Fd");
    }

    #[test]
    fn test_timeout_configuration() {
        let repo = BuildLibraryRepository::new("http://localhost:3000/").unwrap();
        assert_eq!(repo.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let settings = RegistrySettings {
            endpoint: "http://localhost:3000/".to_string(),
            timeout_seconds: 5,
        };
        let configured = BuildLibraryRepository::from_settings(&settings).unwrap();
        assert_eq!(configured.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_absent_statuses() {
        assert!(is_absent(StatusCode::NOT_FOUND));
        assert!(is_absent(StatusCode::BAD_REQUEST));
        assert!(!is_absent(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_absent(StatusCode::OK));
    }

    #[test]
    fn test_record_parsing() {
        let json = r##"{
            "name": "swd",
            "version": "0.1.0",
            "description": "Serial wire debug",
            "id": "17",
            "files": [
                {"name": "swd.cpp", "content": "// swd"},
                {"name": "README.md", "kind": "other", "content": "# swd"}
            ]
        }"##;

        let record: LibraryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata.name, "swd");
        assert_eq!(record.metadata.id.as_deref(), Some("17"));
        assert!(!record.metadata.extra.contains_key("files"));
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].kind, FileKind::Source);
        assert_eq!(record.files[1].kind, FileKind::Other);
    }
}
