//! Library descriptor records and on-disk layout versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Descriptor record for a library.
///
/// The canonical fields are `name`, `version`, `author`, `license` and
/// `description`. Anything else a descriptor carries is kept in `extra` so
/// that a legacy JSON descriptor survives a read/write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryMetadata {
    /// Library name (must match the directory or registry key)
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// One-line description (`sentence` in the key-value descriptor)
    #[serde(default, alias = "sentence", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Registry-assigned identifier; never written to disk
    #[serde(
        default,
        deserialize_with = "optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    /// Unrecognised descriptor fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LibraryMetadata {
    /// Create a record with only the name set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Copy of this record with the registry id removed
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Registry identifiers arrive as JSON strings or numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

/// Deserialize an identifier given as a string or a number
pub(crate) fn text_or_number_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

/// On-disk layout of a library in a filesystem repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LibraryLayout {
    /// Legacy layout: `spark.json` descriptor, includes prefixed by library name
    V1 = 1,

    /// Current layout: `library.properties` descriptor, flat includes
    #[default]
    V2 = 2,
}

impl LibraryLayout {
    pub fn version(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for LibraryLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version())
    }
}

impl TryFrom<u8> for LibraryLayout {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> anyhow::Result<Self> {
        match value {
            1 => Ok(LibraryLayout::V1),
            2 => Ok(LibraryLayout::V2),
            _ => anyhow::bail!("Unknown library layout: {} (expected 1 or 2)", value),
        }
    }
}

impl std::str::FromStr for LibraryLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let version: u8 = s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown library layout: {}", s))?;
        Self::try_from(version)
    }
}
