//! Catalog summaries returned by `index()`.

use serde::{Deserialize, Serialize};

use super::metadata::text_or_number_id;

/// Visibility of a library in a registry catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    /// Any visibility tag this client does not recognise
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
            Visibility::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single entry in a repository catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    /// Registry identifier (numeric ids are kept as their decimal text)
    #[serde(deserialize_with = "text_or_number_id")]
    pub id: String,

    /// Library name as listed in the catalog
    pub title: String,

    /// Short description
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub version: String,

    pub visibility: Visibility,
}
