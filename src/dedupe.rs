//! Duplicate detection within a record set.
//!
//! Finds records that describe the same work and reports them for review.
//! Nothing is ever merged, removed or reordered: duplicates are data for a
//! human, not something the engine resolves on its own.
//!
//! ## Evidence
//!
//! Two records are linked when they share, in priority order:
//!
//! 1. a normalized DOI (from the `doi` field or a `doi.org` URL)
//! 2. a normalized URL
//! 3. a non-empty normalized title
//!
//! Domain-name titles (`fashionrevolution.org`) and fallback titles
//! (`Web page by ...`) say nothing about the work and are never title evidence.
//!
//! Links are transitive: if A shares a DOI with B and B shares a title with C,
//! all three form one group. A group reports the strongest evidence among its
//! links.
//!
//! ## Usage
//!
//! ```rust
//! use bibsane::{find_duplicates, DuplicateEvidence, RawRecord};
//!
//! let records = vec![
//!     RawRecord {
//!         key: "eea2019".to_string(),
//!         title: "Textiles in Europe's circular economy".to_string(),
//!         ..Default::default()
//!     },
//!     RawRecord {
//!         key: "eea2019b".to_string(),
//!         title: "Textiles in Europe’s Circular Economy.".to_string(),
//!         ..Default::default()
//!     },
//! ];
//!
//! let groups = find_duplicates(&records);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].members, vec!["eea2019", "eea2019b"]);
//! assert_eq!(groups[0].evidence, DuplicateEvidence::SharedNormalizedTitle);
//! ```

use crate::RawRecord;
use crate::classify::{is_domain_title, is_stub_title, normalize_title};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Evidence that links records into a duplicate group.
///
/// Ordered from strongest to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateEvidence {
    SharedDoi,
    SharedUrl,
    SharedNormalizedTitle,
}

/// What should happen to a duplicate group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    #[default]
    ManualReviewRequired,
}

/// Records that appear to describe the same work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Record keys, in input order
    pub members: Vec<String>,
    /// Positions of the members in the input, parallel to `members`
    pub positions: Vec<usize>,
    /// Strongest evidence linking the group
    pub evidence: DuplicateEvidence,
    /// Always [`ReviewAction::ManualReviewRequired`]
    pub action: ReviewAction,
}

/// Configuration options for duplicate detection.
///
/// ```
/// use bibsane::dedupe::DuplicateDetectorConfig;
///
/// // only identifiers count, shared titles are ignored
/// let config = DuplicateDetectorConfig { title_evidence: false };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DuplicateDetectorConfig {
    /// Whether a shared normalized title links records.
    pub title_evidence: bool,
}

impl Default for DuplicateDetectorConfig {
    fn default() -> Self {
        Self {
            title_evidence: true,
        }
    }
}

/// Duplicate detection engine.
///
/// # Examples
///
/// ```
/// use bibsane::dedupe::{DuplicateDetector, DuplicateDetectorConfig};
///
/// let detector = DuplicateDetector::new().with_config(DuplicateDetectorConfig {
///     title_evidence: false,
/// });
/// assert!(detector.find_duplicates(&[]).is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct DuplicateDetector {
    config: DuplicateDetectorConfig,
}

/// Matching keys of one record.
#[derive(Debug)]
struct PreprocessedRecord {
    doi: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

impl PreprocessedRecord {
    fn new(record: &RawRecord, title_evidence: bool) -> Self {
        let title = (title_evidence
            && !is_domain_title(&record.title)
            && !is_stub_title(&record.title))
        .then(|| normalize_title(&record.title))
        .filter(|title| !title.is_empty());

        Self {
            doi: record.effective_doi(),
            url: record.normalized_url(),
            title,
        }
    }

    fn key(&self, evidence: DuplicateEvidence) -> Option<&str> {
        match evidence {
            DuplicateEvidence::SharedDoi => self.doi.as_deref(),
            DuplicateEvidence::SharedUrl => self.url.as_deref(),
            DuplicateEvidence::SharedNormalizedTitle => self.title.as_deref(),
        }
    }
}

/// Union-find over record positions.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Joins the sets of `a` and `b`; the smaller root wins so roots stay stable.
    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            let (root, child) = if a < b { (a, b) } else { (b, a) };
            self.parent[child] = root;
        }
    }
}

impl DuplicateDetector {
    /// Creates a detector with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DuplicateDetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Groups records that share a DOI, URL or normalized title.
    ///
    /// Groups are ordered by the position of their first member and only
    /// groups of two or more records are returned.
    #[must_use]
    pub fn find_duplicates(&self, records: &[RawRecord]) -> Vec<DuplicateGroup> {
        let preprocessed: Vec<PreprocessedRecord> = records
            .iter()
            .map(|record| PreprocessedRecord::new(record, self.config.title_evidence))
            .collect();

        let mut set = DisjointSet::new(records.len());
        let mut links: Vec<(usize, DuplicateEvidence)> = Vec::new();

        for evidence in [
            DuplicateEvidence::SharedDoi,
            DuplicateEvidence::SharedUrl,
            DuplicateEvidence::SharedNormalizedTitle,
        ] {
            let buckets = preprocessed
                .iter()
                .enumerate()
                .filter_map(|(position, record)| record.key(evidence).map(|key| (key, position)))
                .into_group_map();

            for (key, positions) in buckets {
                if positions.len() < 2 {
                    continue;
                }
                debug!("Records {:?} share {:?} key {:?}", positions, evidence, key);
                let first = positions[0];
                for &other in &positions[1..] {
                    set.union(first, other);
                }
                links.push((first, evidence));
            }
        }

        let mut strongest: HashMap<usize, DuplicateEvidence> = HashMap::new();
        for (position, evidence) in links {
            let root = set.find(position);
            strongest
                .entry(root)
                .and_modify(|current| *current = (*current).min(evidence))
                .or_insert(evidence);
        }

        let groups: Vec<DuplicateGroup> = (0..records.len())
            .map(|position| (set.find(position), position))
            .into_group_map()
            .into_iter()
            .filter(|(_, positions)| positions.len() > 1)
            .filter_map(|(root, mut positions)| {
                positions.sort_unstable();
                Some(DuplicateGroup {
                    members: positions.iter().map(|&i| records[i].key.clone()).collect(),
                    positions,
                    evidence: *strongest.get(&root)?,
                    action: ReviewAction::ManualReviewRequired,
                })
            })
            .sorted_by_key(|group| group.positions[0])
            .collect();

        if !groups.is_empty() {
            info!(
                "Found {} duplicate groups covering {} records",
                groups.len(),
                groups.iter().map(|g| g.members.len()).sum::<usize>()
            );
        }

        groups
    }
}

/// Groups duplicate records with the default configuration.
///
/// See [`DuplicateDetector::find_duplicates`].
#[must_use]
pub fn find_duplicates(records: &[RawRecord]) -> Vec<DuplicateGroup> {
    DuplicateDetector::new().find_duplicates(records)
}
