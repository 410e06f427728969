//! Record sanitization and report building.
//!
//! The [`Sanitizer`] runs the whole pipeline over a record set: it resolves
//! every record against the reference index, applies the safe repairs,
//! flags duplicates and collects everything a human has to decide into a
//! [`SanitizationReport`].
//!
//! Repairs applied to a record:
//!
//! - a single author that names an organization is braced, so
//!   `European Commission` becomes `{European Commission}`
//! - an arXiv URL or DOI without an `eprint` field gets `eprint` and
//!   `archiveprefix` fields
//! - a domain-name title is replaced by the title of the matched index entry
//!   and kept in `raw_fields["original_title"]`
//!
//! Everything else (stub titles, unrepairable domain titles, conflicting
//! identifiers, records missing from the index in emergency mode) is only
//! tagged and queued in `manual_review`. No record is ever dropped.
//!
//! # Emergency mode
//!
//! In [`OperatingMode::Emergency`] the sanitizer refuses to run without a
//! present, non-empty index, and every record the index does not know is
//! reported in `not_found_in_index`.
//!
//! ```
//! use bibsane::{OperatingMode, RawRecord, SanitizeError, Sanitizer, SanitizerConfig};
//!
//! let sanitizer = Sanitizer::new().with_config(SanitizerConfig {
//!     mode: OperatingMode::Emergency,
//!     ..Default::default()
//! });
//!
//! let result = sanitizer.sanitize(&[RawRecord::default()], None);
//! assert!(matches!(result, Err(SanitizeError::EmergencyModeViolation(_))));
//! ```

use crate::classify::{is_domain_title, is_organization_author, is_stub_title};
use crate::dedupe::{DuplicateDetector, DuplicateGroup};
use crate::index::{IndexEntry, ReferenceIndex};
use crate::matcher::{MatchBasis, MatchResult, Matcher, find_conflict};
use crate::{IssueKind, RawRecord, Result, SanitizeError};
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How strictly the sanitizer depends on the reference index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Runs with or without an index; unmatched records are tolerated.
    #[default]
    Normal,
    /// Requires a non-empty index and reports every unmatched record.
    Emergency,
}

/// Configuration options for a sanitization run.
///
/// # Examples
///
/// ```
/// use bibsane::{OperatingMode, SanitizerConfig};
///
/// let config: SanitizerConfig = serde_json::from_str(r#"{"mode": "emergency"}"#).unwrap();
/// assert_eq!(config.mode, OperatingMode::Emergency);
/// assert!(config.detect_duplicates);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Operating mode.
    pub mode: OperatingMode,
    /// Whether to match records on the rayon thread pool.
    /// Only effective with the `parallel` feature.
    pub run_in_parallel: bool,
    /// Whether to look for duplicates within the record set.
    pub detect_duplicates: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Normal,
            run_in_parallel: false,
            detect_duplicates: true,
        }
    }
}

/// A record the index does not know, reported in emergency mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundEntry {
    pub key: String,
    pub url: Option<String>,
    pub normalized_url: Option<String>,
    pub title: String,
}

/// Summary of a sanitization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizationReport {
    /// Records whose organization author was braced
    pub fixed_orgs: usize,
    /// Records that received an `eprint` field
    pub fixed_arxiv: usize,
    /// Records with a domain-name title, repaired or not
    pub domain_titles: usize,
    /// Records with a fallback title
    pub stub_titles: usize,
    /// Keys of records that need a human decision, in input order without repeats
    pub manual_review: Vec<String>,
    /// Duplicate groups within the record set
    pub duplicates: Vec<DuplicateGroup>,
    /// Emergency mode only: records missing from the index
    pub not_found_in_index: Vec<NotFoundEntry>,
    /// Keys of records matched on their normalized title only
    pub title_basis_matches: Vec<String>,
    /// Keys of records whose DOI and URL point at different index entries
    pub conflicting_identifiers: Vec<String>,
}

impl SanitizationReport {
    /// Serializes the report to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns `SanitizeError::Report` if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the report to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns `SanitizeError::Report` if serialization fails
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn queue_for_review(&mut self, key: &str) {
        self.manual_review.push(key.to_string());
    }
}

/// Sanitization engine.
///
/// # Examples
///
/// ```
/// use bibsane::{RawRecord, Sanitizer};
///
/// let records = vec![RawRecord {
///     key: "ec2020".to_string(),
///     title: "Circular economy action plan".to_string(),
///     authors: vec!["European Commission".to_string()],
///     ..Default::default()
/// }];
///
/// let (sanitized, report) = Sanitizer::new().sanitize(&records, None).unwrap();
/// assert_eq!(sanitized[0].authors, vec!["{European Commission}"]);
/// assert_eq!(report.fixed_orgs, 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
}

impl Sanitizer {
    /// Creates a sanitizer in normal mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SanitizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sanitizes `records` against `index`.
    ///
    /// The input is left untouched; the returned records are repaired copies
    /// in input order, one per input record.
    ///
    /// # Errors
    ///
    /// Returns `SanitizeError::EmergencyModeViolation` in emergency mode when
    /// `index` is missing or empty. No record is processed in that case.
    pub fn sanitize(
        &self,
        records: &[RawRecord],
        index: Option<&ReferenceIndex>,
    ) -> Result<(Vec<RawRecord>, SanitizationReport)> {
        if self.config.mode == OperatingMode::Emergency {
            match index {
                None => return Err(emergency_violation("no reference index was provided")),
                Some(index) if index.is_empty() => {
                    return Err(emergency_violation("the reference index is empty"));
                }
                Some(_) => {}
            }
        }

        let mut sanitized: Vec<RawRecord> = records.to_vec();
        for (position, record) in sanitized.iter_mut().enumerate() {
            if record.key.trim().is_empty() {
                record.key = synthetic_key(position);
                debug!("Assigned synthetic key {} to record without key", record.key);
            }
        }

        let matches = Matcher::new()
            .with_parallel(self.config.run_in_parallel)
            .match_all(&sanitized, index);

        let mut report = SanitizationReport::default();
        for (record, result) in sanitized.iter_mut().zip(&matches) {
            let entry = index
                .zip(result.matched_id.as_deref())
                .and_then(|(index, id)| index.get(id));
            self.process_record(record, result, entry, index, &mut report);
        }

        if self.config.detect_duplicates {
            let groups = DuplicateDetector::new().find_duplicates(&sanitized);
            for group in &groups {
                for &position in &group.positions {
                    sanitized[position].issues.insert(IssueKind::PossibleDuplicate);
                }
            }
            report.duplicates = groups;
        }

        report.manual_review = report.manual_review.into_iter().unique().collect();

        info!(
            "Sanitized {} records: {} matched, {} organization authors, {} arXiv eprints, \
             {} domain titles, {} stub titles, {} duplicate groups, {} queued for review",
            sanitized.len(),
            matches.iter().filter(|m| m.is_match()).count(),
            report.fixed_orgs,
            report.fixed_arxiv,
            report.domain_titles,
            report.stub_titles,
            report.duplicates.len(),
            report.manual_review.len()
        );

        Ok((sanitized, report))
    }

    /// Loads the index from `index_path` and sanitizes `records` against it.
    ///
    /// Without a path the run proceeds index-less in normal mode.
    ///
    /// # Errors
    ///
    /// Returns `SanitizeError::EmergencyModeViolation` in emergency mode when the
    /// path is missing or points at no file, and `SanitizeError::IndexBuild` when
    /// the file cannot be read or parsed.
    pub fn sanitize_from_path(
        &self,
        records: &[RawRecord],
        index_path: Option<&Path>,
    ) -> Result<(Vec<RawRecord>, SanitizationReport)> {
        let emergency = self.config.mode == OperatingMode::Emergency;

        match index_path {
            None if emergency => Err(emergency_violation("no reference index path was provided")),
            None => self.sanitize(records, None),
            Some(path) if emergency && !path.exists() => Err(emergency_violation(&format!(
                "reference index {} does not exist",
                path.display()
            ))),
            Some(path) => {
                let index = ReferenceIndex::from_path(path)?;
                self.sanitize(records, Some(&index))
            }
        }
    }

    fn process_record(
        &self,
        record: &mut RawRecord,
        result: &MatchResult,
        entry: Option<&IndexEntry>,
        index: Option<&ReferenceIndex>,
        report: &mut SanitizationReport,
    ) {
        let conflict = index.and_then(|index| find_conflict(record, index));
        if let Some(conflict) = &conflict {
            warn!(
                "Record {} has a DOI pointing at {} and a URL pointing at {}",
                conflict.record_key, conflict.doi_entry, conflict.url_entry
            );
            record.issues.insert(IssueKind::ConflictingIdentifiers);
            report.conflicting_identifiers.push(record.key.clone());
            report.queue_for_review(&record.key);
        }

        if brace_organization_author(record) {
            report.fixed_orgs += 1;
        }
        if add_arxiv_eprint(record) {
            report.fixed_arxiv += 1;
        }

        if is_domain_title(&record.title) {
            report.domain_titles += 1;
            record.issues.insert(IssueKind::DomainTitle);
            // a conflicting record has no trustworthy entry to take a title from
            let source = entry.filter(|entry| conflict.is_none() && is_usable_title(&entry.title));
            match source {
                Some(entry) => {
                    debug!(
                        "Replacing domain title {:?} of {} with {:?} from index entry {}",
                        record.title, record.key, entry.title, entry.id
                    );
                    let original = std::mem::replace(&mut record.title, entry.title.clone());
                    record
                        .raw_fields
                        .insert("original_title".to_string(), original);
                }
                None => {
                    debug!("Domain title {:?} of {} cannot be repaired", record.title, record.key);
                    report.queue_for_review(&record.key);
                }
            }
        } else if is_stub_title(&record.title) {
            report.stub_titles += 1;
            record.issues.insert(IssueKind::StubTitle);
            report.queue_for_review(&record.key);
        }

        if result.basis == MatchBasis::NormalizedTitle {
            record.issues.insert(IssueKind::TitleBasisMatch);
            report.title_basis_matches.push(record.key.clone());
        }

        if self.config.mode == OperatingMode::Emergency && !result.is_match() {
            let normalized_url = record.normalized_url();
            warn!(
                "Record {} not found in reference index (url: {:?}, title: {:?})",
                record.key, normalized_url, record.title
            );
            record.issues.insert(IssueKind::NotFoundInIndex);
            report.not_found_in_index.push(NotFoundEntry {
                key: record.key.clone(),
                url: record.url.clone(),
                normalized_url,
                title: record.title.clone(),
            });
            report.queue_for_review(&record.key);
        }
    }
}

/// Sanitizes `records`, in emergency mode when `emergency_mode` is set.
///
/// # Errors
///
/// See [`Sanitizer::sanitize`].
pub fn sanitize(
    records: &[RawRecord],
    index: Option<&ReferenceIndex>,
    emergency_mode: bool,
) -> Result<(Vec<RawRecord>, SanitizationReport)> {
    let mode = if emergency_mode {
        OperatingMode::Emergency
    } else {
        OperatingMode::Normal
    };

    Sanitizer::new()
        .with_config(SanitizerConfig {
            mode,
            ..Default::default()
        })
        .sanitize(records, index)
}

/// Key for a record without one, stable across runs over the same input.
fn synthetic_key(position: usize) -> String {
    format!("record-{}", position + 1)
}

fn emergency_violation(reason: &str) -> SanitizeError {
    error!("Refusing to run in emergency mode: {}", reason);
    SanitizeError::EmergencyModeViolation(reason.to_string())
}

fn is_usable_title(title: &str) -> bool {
    !title.trim().is_empty() && !is_domain_title(title) && !is_stub_title(title)
}

/// Braces a lone organization author so renderers keep it as one name.
fn brace_organization_author(record: &mut RawRecord) -> bool {
    let [author] = record.authors.as_mut_slice() else {
        return false;
    };
    let name = author.trim();
    if name.starts_with('{') && name.ends_with('}') {
        return false;
    }
    if !is_organization_author(name) {
        return false;
    }

    debug!("Bracing organization author {:?} of {}", name, record.key);
    *author = format!("{{{}}}", name);
    true
}

/// Adds `eprint` and `archiveprefix` fields for records carrying an arXiv id.
fn add_arxiv_eprint(record: &mut RawRecord) -> bool {
    if record.raw_field("eprint").is_some() {
        return false;
    }
    let Some(id) = record.arxiv_id() else {
        return false;
    };

    debug!("Adding eprint {} to {}", id, record.key);
    record.raw_fields.insert("eprint".to_string(), id);
    if record.raw_field("archiveprefix").is_none() {
        record
            .raw_fields
            .insert("archiveprefix".to_string(), "arXiv".to_string());
    }
    true
}
