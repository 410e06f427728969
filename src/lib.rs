//! Entity resolution and sanitization for bibliographic citation records.
//!
//! `bibsane` takes raw citation records, as extracted from documents or scraped
//! bibliography files, and a trusted reference index exported from a reference
//! manager. It decides which records refer to works in the index, normalizes
//! their identifiers, repairs systematic metadata defects and produces a report
//! with a queue of everything a human has to look at.
//!
//! # Key Features
//!
//! - **Identifier normalization**: DOIs, arXiv URLs (abs/html/pdf, any version),
//!   Amazon product pages on any marketplace, generic URLs
//! - **Reference index**: CSL JSON, Zotero-style CSV and Zotero RDF exports,
//!   looked up by DOI, normalized URL and normalized title
//! - **Matching cascade**: DOI, then URL, then title, each with a fixed confidence
//! - **Duplicate flagging**: transitive grouping of records that share a DOI,
//!   URL or title; duplicates are reported, never merged
//! - **Safe repairs**: organization authors, arXiv eprints, domain-name titles
//! - **Emergency mode**: refuses to run without a non-empty trusted index
//!
//! # Basic Usage
//!
//! ```rust
//! use bibsane::{build_index, IndexFormat, RawRecord, Sanitizer};
//!
//! let library = r#"[{"id": "ITEM1", "title": "Attention Is All You Need",
//!                    "URL": "https://arxiv.org/abs/1706.03762"}]"#;
//! let index = build_index(library, IndexFormat::CslJson).unwrap();
//!
//! let records = vec![RawRecord {
//!     key: "vaswani2017".to_string(),
//!     title: "Arxiv.org".to_string(),
//!     url: Some("https://arxiv.org/pdf/1706.03762v7.pdf".to_string()),
//!     ..Default::default()
//! }];
//!
//! let (sanitized, report) = Sanitizer::new().sanitize(&records, Some(&index)).unwrap();
//! assert_eq!(sanitized[0].title, "Attention Is All You Need");
//! assert_eq!(report.domain_titles, 1);
//! assert_eq!(report.fixed_arxiv, 1);
//! ```
//!
//! # Error Handling
//!
//! Only two conditions are fatal: a reference index that cannot be built
//! ([`IndexBuildError`]) and emergency mode without a usable index
//! ([`SanitizeError::EmergencyModeViolation`]). Everything else a record can
//! get wrong is report data, recorded as an [`IssueKind`] on the record.
//!
//! ```rust
//! use bibsane::{sanitize, RawRecord, SanitizeError};
//!
//! let records = vec![RawRecord::default()];
//! match sanitize(&records, None, true) {
//!     Err(SanitizeError::EmergencyModeViolation(msg)) => eprintln!("refusing to run: {msg}"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub mod classify;
pub mod dedupe;
pub mod index;
pub mod matcher;
pub mod normalize;
mod regex;
pub mod sanitize;
mod utils;

// Reexports
pub use classify::{is_domain_title, is_organization_author, is_stub_title, normalize_title};
pub use dedupe::{DuplicateDetector, DuplicateEvidence, DuplicateGroup, ReviewAction, find_duplicates};
pub use index::{IndexEntry, IndexFormat, IndexParser, ReferenceIndex, build_index};
pub use matcher::{IdentifierConflict, MatchBasis, MatchResult, Matcher, find_conflict, match_record};
pub use normalize::{canonical_url, normalize_doi, normalize_url};
pub use sanitize::{
    NotFoundEntry, OperatingMode, SanitizationReport, Sanitizer, SanitizerConfig, sanitize,
};

/// A specialized Result type for sanitization runs.
pub type Result<T> = std::result::Result<T, SanitizeError>;

/// Errors raised while building a [`ReferenceIndex`].
#[derive(Error, Debug)]
pub enum IndexBuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reference index source is empty")]
    EmptySource,

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Malformed input: {message} at line {line}")]
    MalformedInput { message: String, line: usize },

    #[error("Unsupported index format: {0}")]
    UnknownFormat(String),
}

impl From<serde_json::Error> for IndexBuildError {
    fn from(err: serde_json::Error) -> Self {
        IndexBuildError::MalformedInput {
            message: err.to_string(),
            line: err.line(),
        }
    }
}

#[cfg(feature = "csv")]
impl From<::csv::Error> for IndexBuildError {
    fn from(err: ::csv::Error) -> Self {
        match err.position() {
            Some(pos) => IndexBuildError::MalformedInput {
                message: err.to_string(),
                line: pos.line() as usize,
            },
            None => IndexBuildError::InvalidFormat(err.to_string()),
        }
    }
}

#[cfg(feature = "xml")]
impl From<quick_xml::Error> for IndexBuildError {
    fn from(err: quick_xml::Error) -> Self {
        IndexBuildError::InvalidFormat(err.to_string())
    }
}

/// Fatal errors of a sanitization run.
#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("Reference index error: {0}")]
    IndexBuild(#[from] IndexBuildError),

    /// Emergency mode was requested without a present, non-empty reference index.
    #[error("Emergency mode violation: {0}")]
    EmergencyModeViolation(String),

    #[error("Report serialization error: {0}")]
    Report(#[from] serde_json::Error),
}

/// Kind of work a citation refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Article,
    Preprint,
    Webpage,
    Book,
    Report,
    #[default]
    Misc,
    OrganizationDocument,
}

impl EntryType {
    /// Maps a BibTeX, CSL or Zotero type name onto an [`EntryType`].
    ///
    /// Unknown names map to [`EntryType::Misc`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bibsane::EntryType;
    ///
    /// assert_eq!(EntryType::from_type_name("article-journal"), EntryType::Article);
    /// assert_eq!(EntryType::from_type_name("@online"), EntryType::Webpage);
    /// assert_eq!(EntryType::from_type_name("bib:Book"), EntryType::Book);
    /// ```
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        let name = name.trim().trim_start_matches('@');
        let name = name.rsplit(':').next().unwrap_or(name).to_ascii_lowercase();

        match name.as_str() {
            "article" | "article-journal" | "journalarticle" | "article-magazine"
            | "magazinearticle" | "article-newspaper" | "newspaperarticle" | "inproceedings"
            | "conferencepaper" | "paper-conference" => EntryType::Article,
            "preprint" | "unpublished" | "manuscript" => EntryType::Preprint,
            "webpage" | "online" | "www" | "electronic" | "post-weblog" | "blogpost"
            | "post" | "website" => EntryType::Webpage,
            "book" | "booklet" | "inbook" | "incollection" | "booksection" | "chapter" => {
                EntryType::Book
            }
            "report" | "techreport" | "thesis" | "phdthesis" | "mastersthesis" => {
                EntryType::Report
            }
            "standard" | "legislation" | "legal_case" | "statute" | "bill" | "regulation"
            | "document" => EntryType::OrganizationDocument,
            _ => EntryType::Misc,
        }
    }
}

/// Problems found on a record.
///
/// Issues are report data, not errors: they mark records a human should look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// The title is a bare domain name such as `fashionrevolution.org`
    DomainTitle,
    /// The title comes from a fallback template such as `Web page by ...`
    StubTitle,
    /// DOI and URL resolve to different index entries
    ConflictingIdentifiers,
    /// Emergency mode found no index entry for the record
    NotFoundInIndex,
    /// The record shares a DOI, URL or title with another record
    PossibleDuplicate,
    /// The record was matched on its normalized title only
    TitleBasisMatch,
}

/// One citation as it appears in a source document or bibliography file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    /// Citation key, may be empty
    pub key: String,
    /// Type of the cited work
    pub entry_type: EntryType,
    /// Title of the work
    pub title: String,
    /// Raw author strings, in citation order
    pub authors: Vec<String>,
    /// Publication year
    pub year: Option<i32>,
    /// Digital Object Identifier
    pub doi: Option<String>,
    /// URL the citation points at
    pub url: Option<String>,
    /// Journal, publisher or website name
    pub venue: Option<String>,
    /// Additional fields not covered by standard fields
    pub raw_fields: BTreeMap<String, String>,
    /// Problems found during sanitization
    pub issues: BTreeSet<IssueKind>,
}

impl RawRecord {
    /// Looks up a raw field by name, ignoring ASCII case.
    pub fn raw_field(&self, name: &str) -> Option<&str> {
        self.raw_fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The record's normalized DOI.
    ///
    /// Falls back to the DOI embedded in a `doi.org` URL when the `doi` field
    /// is missing or unusable.
    pub fn effective_doi(&self) -> Option<String> {
        self.doi
            .as_deref()
            .and_then(normalize::normalize_doi)
            .or_else(|| {
                self.normalized_url()
                    .and_then(|url| url.strip_prefix("doi.org/").map(str::to_string))
            })
    }

    /// The record's URL passed through [`normalize_url`], if it has a non-blank one.
    pub fn normalized_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(normalize::normalize_url)
    }

    /// The arXiv identifier carried by the record's URL or DOI.
    pub fn arxiv_id(&self) -> Option<String> {
        self.url
            .as_deref()
            .and_then(normalize::arxiv_id)
            .or_else(|| self.doi.as_deref().and_then(normalize::arxiv_id))
    }
}
