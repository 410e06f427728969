//! Trusted reference index.
//!
//! A [`ReferenceIndex`] is built once per run from a reference-manager export and
//! is read-only afterwards. Each entry is reachable three ways: by normalized
//! DOI, by normalized URL and by normalized title. An entry with a DOI is also
//! reachable through its `doi.org/<doi>` URL key.
//!
//! Supported exports:
//!
//! - CSL JSON, a flat list of records ([`CslJsonParser`])
//! - Zotero-style CSV ([`CsvIndexParser`], `csv` feature)
//! - Zotero RDF, a linked-document graph ([`RdfIndexParser`], `xml` feature)
//!
//! # Example
//!
//! ```
//! use bibsane::{build_index, IndexFormat};
//!
//! let input = r#"[{"id": "ABCD1234", "title": "Circular Economy in Europe",
//!                  "DOI": "10.2800/51444", "issued": {"date-parts": [[2016]]}}]"#;
//!
//! let index = build_index(input, IndexFormat::CslJson).unwrap();
//! let entry = index.get_by_doi("https://doi.org/10.2800/51444").unwrap();
//! assert_eq!(entry.title, "Circular Economy in Europe");
//! assert_eq!(entry.year, Some(2016));
//! ```

mod csl_json;
#[cfg(feature = "csv")]
mod csv;
#[cfg(feature = "xml")]
mod rdf;

pub use csl_json::CslJsonParser;
#[cfg(feature = "csv")]
pub use csv::{CsvConfig, CsvIndexParser};
#[cfg(feature = "xml")]
pub use rdf::RdfIndexParser;

use crate::classify::normalize_title;
use crate::normalize::{normalize_doi, normalize_url};
use crate::{EntryType, IndexBuildError};
use compact_str::CompactString;
use log::{debug, info};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

/// One trusted record of the reference index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stable external identifier (item key, CSL id or RDF node URI)
    pub id: String,
    /// Title of the work
    pub title: String,
    /// Author strings, in `Family, Given` form where the export has structured names
    pub authors: Vec<String>,
    /// Publication year
    pub year: Option<i32>,
    /// Normalized DOI
    pub doi: Option<String>,
    /// URL as exported
    pub url: Option<String>,
    /// `url` passed through [`normalize_url`]
    pub normalized_url: Option<String>,
    /// Type of the work
    pub entry_type: EntryType,
}

/// Supported reference-manager export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFormat {
    /// Flat list of CSL JSON records
    CslJson,
    /// Zotero-style CSV export
    Csv,
    /// Zotero RDF linked-document export
    ZoteroRdf,
}

impl IndexFormat {
    /// Guesses the format from the first non-blank character of an export.
    #[must_use]
    pub fn detect(content: &str) -> Self {
        match content.trim_start().chars().next() {
            Some('[') | Some('{') => IndexFormat::CslJson,
            Some('<') => IndexFormat::ZoteroRdf,
            _ => IndexFormat::Csv,
        }
    }

    /// Maps a file extension onto a format.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(IndexFormat::CslJson),
            "csv" => Some(IndexFormat::Csv),
            "rdf" | "xml" => Some(IndexFormat::ZoteroRdf),
            _ => None,
        }
    }
}

/// Trait for reference-manager export parsers.
pub trait IndexParser {
    /// Parse an export into index entries.
    ///
    /// # Errors
    ///
    /// Returns `IndexBuildError` if the input is not a valid export of this format
    fn parse(&self, input: &str) -> Result<Vec<IndexEntry>, IndexBuildError>;
}

/// Read-only lookup structure over the trusted entries.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: Vec<IndexEntry>,
    by_doi: HashMap<CompactString, usize>,
    by_url: HashMap<CompactString, usize>,
    by_title: HashMap<CompactString, usize>,
}

/// Builds a reference index from export text.
///
/// # Errors
///
/// Returns `IndexBuildError::EmptySource` for blank input and a parse error if
/// the input is not a valid export of `format`. A valid export with no items
/// yields an empty index.
pub fn build_index(source: &str, format: IndexFormat) -> Result<ReferenceIndex, IndexBuildError> {
    if source.trim().is_empty() {
        return Err(IndexBuildError::EmptySource);
    }

    let entries = match format {
        IndexFormat::CslJson => CslJsonParser::new().parse(source)?,
        #[cfg(feature = "csv")]
        IndexFormat::Csv => CsvIndexParser::new().parse(source)?,
        #[cfg(feature = "xml")]
        IndexFormat::ZoteroRdf => RdfIndexParser::new().parse(source)?,
        #[allow(unreachable_patterns)]
        other => {
            return Err(IndexBuildError::UnknownFormat(format!(
                "{:?} support is not enabled",
                other
            )));
        }
    };

    Ok(ReferenceIndex::from_entries(entries))
}

impl ReferenceIndex {
    /// Builds the lookup maps over `entries`.
    ///
    /// DOIs and URLs are normalized here, and entries without an id receive a
    /// synthetic one. When two entries share a key the first one keeps it.
    #[must_use]
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let mut index = ReferenceIndex {
            entries: Vec::with_capacity(entries.len()),
            ..Default::default()
        };

        for mut entry in entries {
            if entry.id.trim().is_empty() {
                entry.id = nanoid!();
            }
            entry.doi = entry.doi.as_deref().and_then(normalize_doi);
            entry.url = entry.url.filter(|url| !url.trim().is_empty());
            entry.normalized_url = entry.url.as_deref().map(normalize_url);

            let position = index.entries.len();
            if let Some(doi) = entry.doi.as_deref() {
                Self::insert_key(&mut index.by_doi, doi, position, &entry.id);
                Self::insert_key(&mut index.by_url, &format!("doi.org/{}", doi), position, &entry.id);
            }
            if let Some(url) = entry.normalized_url.as_deref() {
                Self::insert_key(&mut index.by_url, url, position, &entry.id);
            }
            let title = normalize_title(&entry.title);
            if !title.is_empty() {
                Self::insert_key(&mut index.by_title, &title, position, &entry.id);
            }

            index.entries.push(entry);
        }

        info!(
            "Built reference index with {} entries ({} DOIs, {} URLs, {} titles)",
            index.entries.len(),
            index.by_doi.len(),
            index.by_url.len(),
            index.by_title.len()
        );

        index
    }

    /// Reads and parses an export file.
    ///
    /// The format comes from the file extension, falling back to content sniffing.
    ///
    /// # Errors
    ///
    /// Returns `IndexBuildError::Io` if the file cannot be read, otherwise the
    /// errors of [`build_index`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IndexBuildError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let format = IndexFormat::from_extension(path).unwrap_or_else(|| IndexFormat::detect(&content));
        info!("Loading reference index from {} as {:?}", path.display(), format);
        build_index(&content, format)
    }

    fn insert_key(map: &mut HashMap<CompactString, usize>, key: &str, position: usize, id: &str) {
        match map.entry(CompactString::from(key)) {
            Entry::Vacant(slot) => {
                slot.insert(position);
            }
            Entry::Occupied(_) => {
                debug!("Index key {:?} already taken, entry {} not reachable by it", key, id);
            }
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in export order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Looks up an entry by its external id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Looks up an entry by DOI; the argument is normalized first.
    #[must_use]
    pub fn get_by_doi(&self, doi: &str) -> Option<&IndexEntry> {
        let doi = normalize_doi(doi)?;
        self.by_doi.get(doi.as_str()).map(|&i| &self.entries[i])
    }

    /// Looks up an entry by URL; the argument is normalized first.
    #[must_use]
    pub fn get_by_url(&self, url: &str) -> Option<&IndexEntry> {
        if url.trim().is_empty() {
            return None;
        }
        self.get_by_normalized_url(&normalize_url(url))
    }

    /// Looks up an entry by a key already produced by [`normalize_url`].
    #[must_use]
    pub fn get_by_normalized_url(&self, normalized_url: &str) -> Option<&IndexEntry> {
        self.by_url.get(normalized_url).map(|&i| &self.entries[i])
    }

    /// Looks up an entry by title; the argument is normalized first.
    #[must_use]
    pub fn get_by_title(&self, title: &str) -> Option<&IndexEntry> {
        let title = normalize_title(title);
        if title.is_empty() {
            return None;
        }
        self.by_title.get(title.as_str()).map(|&i| &self.entries[i])
    }
}
