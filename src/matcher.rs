//! Citation matcher.
//!
//! Resolves raw records against a [`ReferenceIndex`] with a fixed priority
//! cascade; the first hit wins:
//!
//! 1. DOI exact lookup, confidence 1.0
//! 2. Normalized URL exact lookup, confidence 1.0
//! 3. Normalized title exact lookup, confidence 0.5, only for records with
//!    neither a usable DOI nor a URL
//! 4. No match
//!
//! Title matches can be wrong (two works may share a title), so they carry
//! reduced confidence and are flagged downstream. A record whose DOI and URL
//! point at different entries is never decided here; [`find_conflict`]
//! reports it instead.
//!
//! # Example
//!
//! ```
//! use bibsane::{build_index, match_record, IndexFormat, MatchBasis, RawRecord};
//!
//! let index = build_index(
//!     r#"[{"id": "A", "title": "Example", "URL": "https://arxiv.org/abs/2401.12345"}]"#,
//!     IndexFormat::CslJson,
//! ).unwrap();
//!
//! let record = RawRecord {
//!     key: "smith2024".to_string(),
//!     url: Some("https://arxiv.org/pdf/2401.12345v2.pdf".to_string()),
//!     ..Default::default()
//! };
//!
//! let result = match_record(&record, &index);
//! assert_eq!(result.basis, MatchBasis::NormalizedUrl);
//! assert_eq!(result.matched_id.as_deref(), Some("A"));
//! assert_eq!(result.confidence, 1.0);
//! ```

use crate::index::{IndexEntry, ReferenceIndex};
use crate::RawRecord;
use log::debug;
use serde::{Deserialize, Serialize};

/// Confidence of DOI and URL matches.
pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
/// Confidence of title-only matches.
pub const TITLE_MATCH_CONFIDENCE: f64 = 0.5;

/// The category of evidence that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchBasis {
    Doi,
    NormalizedUrl,
    NormalizedTitle,
    None,
}

impl MatchBasis {
    /// The confidence a match on this basis carries.
    #[must_use]
    pub fn confidence(self) -> f64 {
        match self {
            MatchBasis::Doi | MatchBasis::NormalizedUrl => EXACT_MATCH_CONFIDENCE,
            MatchBasis::NormalizedTitle => TITLE_MATCH_CONFIDENCE,
            MatchBasis::None => 0.0,
        }
    }
}

/// Outcome of resolving one record against the index.
///
/// `matched_id` is set exactly when `basis` is not [`MatchBasis::None`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub record_key: String,
    pub matched_id: Option<String>,
    pub basis: MatchBasis,
    pub confidence: f64,
}

impl MatchResult {
    /// A match against `entry` on `basis`.
    #[must_use]
    pub fn matched(record_key: &str, entry: &IndexEntry, basis: MatchBasis) -> Self {
        debug_assert!(basis != MatchBasis::None);
        Self {
            record_key: record_key.to_string(),
            matched_id: Some(entry.id.clone()),
            basis,
            confidence: basis.confidence(),
        }
    }

    /// No match.
    #[must_use]
    pub fn unmatched(record_key: &str) -> Self {
        Self {
            record_key: record_key.to_string(),
            matched_id: None,
            basis: MatchBasis::None,
            confidence: 0.0,
        }
    }

    /// Whether the record was matched on any basis.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.basis != MatchBasis::None
    }
}

/// A record whose DOI and URL resolve to different index entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConflict {
    pub record_key: String,
    /// Entry the DOI resolves to
    pub doi_entry: String,
    /// Entry the normalized URL resolves to
    pub url_entry: String,
}

/// Resolves one record against the index.
///
/// Deterministic and side-effect free: the same record and index always give
/// the same result.
#[must_use]
pub fn match_record(record: &RawRecord, index: &ReferenceIndex) -> MatchResult {
    let doi = record.effective_doi();
    if let Some(entry) = doi.as_deref().and_then(|doi| index.get_by_doi(doi)) {
        return MatchResult::matched(&record.key, entry, MatchBasis::Doi);
    }

    let url = record.normalized_url();
    if let Some(entry) = url.as_deref().and_then(|url| index.get_by_normalized_url(url)) {
        return MatchResult::matched(&record.key, entry, MatchBasis::NormalizedUrl);
    }

    if doi.is_none() && url.is_none() {
        if let Some(entry) = index.get_by_title(&record.title) {
            return MatchResult::matched(&record.key, entry, MatchBasis::NormalizedTitle);
        }
    }

    MatchResult::unmatched(&record.key)
}

/// Detects a record whose DOI and URL point at different index entries.
#[must_use]
pub fn find_conflict(record: &RawRecord, index: &ReferenceIndex) -> Option<IdentifierConflict> {
    let doi_entry = index.get_by_doi(record.doi.as_deref()?)?;
    let url_entry = index.get_by_normalized_url(&record.normalized_url()?)?;

    (doi_entry.id != url_entry.id).then(|| IdentifierConflict {
        record_key: record.key.clone(),
        doi_entry: doi_entry.id.clone(),
        url_entry: url_entry.id.clone(),
    })
}

/// Batch matcher over a record set.
///
/// Records are independent and the index is read-only, so with the `parallel`
/// feature the batch can run on the rayon thread pool. Results are always in
/// input order.
#[derive(Debug, Default, Clone)]
pub struct Matcher {
    run_in_parallel: bool,
}

impl Matcher {
    /// Creates a sequential matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel matching.
    ///
    /// Has no effect without the `parallel` feature.
    #[must_use]
    pub fn with_parallel(mut self, run_in_parallel: bool) -> Self {
        self.run_in_parallel = run_in_parallel;
        self
    }

    /// Matches every record; `None` as index leaves every record unmatched.
    pub fn match_all(&self, records: &[RawRecord], index: Option<&ReferenceIndex>) -> Vec<MatchResult> {
        let Some(index) = index else {
            return records
                .iter()
                .map(|record| MatchResult::unmatched(&record.key))
                .collect();
        };

        let results = self.match_batch(records, index);
        debug!(
            "Matched {} of {} records",
            results.iter().filter(|r| r.is_match()).count(),
            results.len()
        );
        results
    }

    fn match_batch(&self, records: &[RawRecord], index: &ReferenceIndex) -> Vec<MatchResult> {
        #[cfg(feature = "parallel")]
        if self.run_in_parallel {
            use rayon::prelude::*;

            return records
                .par_iter()
                .map(|record| match_record(record, index))
                .collect();
        }

        records
            .iter()
            .map(|record| match_record(record, index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index() -> ReferenceIndex {
        ReferenceIndex::from_entries(vec![
            IndexEntry {
                id: "DOI-ENTRY".to_string(),
                title: "Textile waste in Europe".to_string(),
                doi: Some("10.1000/tex".to_string()),
                ..Default::default()
            },
            IndexEntry {
                id: "URL-ENTRY".to_string(),
                title: "Fashion Revolution".to_string(),
                url: Some("https://www.fashionrevolution.org/".to_string()),
                ..Default::default()
            },
            IndexEntry {
                id: "ARXIV-ENTRY".to_string(),
                title: "A preprint".to_string(),
                url: Some("https://arxiv.org/abs/2401.12345".to_string()),
                ..Default::default()
            },
        ])
    }

    fn record(key: &str, title: &str, doi: Option<&str>, url: Option<&str>) -> RawRecord {
        RawRecord {
            key: key.to_string(),
            title: title.to_string(),
            doi: doi.map(String::from),
            url: url.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_doi_match() {
        let result = match_record(&record("a", "", Some("DOI:10.1000/TEX"), None), &index());
        assert_eq!(result.basis, MatchBasis::Doi);
        assert_eq!(result.matched_id.as_deref(), Some("DOI-ENTRY"));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_doi_url_counts_as_doi() {
        let result = match_record(&record("a", "", None, Some("https://doi.org/10.1000/TEX")), &index());
        assert_eq!(result.basis, MatchBasis::Doi);
    }

    #[test]
    fn test_url_match() {
        let result = match_record(
            &record("b", "fashionrevolution.org", None, Some("http://fashionrevolution.org")),
            &index(),
        );
        assert_eq!(result.basis, MatchBasis::NormalizedUrl);
        assert_eq!(result.matched_id.as_deref(), Some("URL-ENTRY"));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_url_with_repeated_trailing_slashes() {
        let index = ReferenceIndex::from_entries(vec![IndexEntry {
            id: "SLASH".to_string(),
            title: "Slashes".to_string(),
            url: Some("https://example.org/a//".to_string()),
            ..Default::default()
        }]);

        let result = match_record(&record("s", "", None, Some("https://example.org/a//")), &index);
        assert_eq!(result.basis, MatchBasis::NormalizedUrl);
        assert_eq!(result.matched_id.as_deref(), Some("SLASH"));
    }

    #[test]
    fn test_doi_miss_falls_through_to_url() {
        let result = match_record(
            &record("c", "", Some("10.9999/unknown"), Some("https://arxiv.org/html/2401.12345v3")),
            &index(),
        );
        assert_eq!(result.basis, MatchBasis::NormalizedUrl);
        assert_eq!(result.matched_id.as_deref(), Some("ARXIV-ENTRY"));
    }

    #[test]
    fn test_title_match_only_without_identifiers() {
        let result = match_record(&record("d", "Textile Waste in Europe.", None, None), &index());
        assert_eq!(result.basis, MatchBasis::NormalizedTitle);
        assert_eq!(result.matched_id.as_deref(), Some("DOI-ENTRY"));
        assert!(result.confidence < 1.0);

        let result = match_record(
            &record("e", "Textile Waste in Europe", None, Some("https://example.org/elsewhere")),
            &index(),
        );
        assert_eq!(result, MatchResult::unmatched("e"));
    }

    #[test]
    fn test_no_match() {
        let result = match_record(&record("f", "Something else", None, None), &index());
        assert_eq!(result.basis, MatchBasis::None);
        assert_eq!(result.matched_id, None);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_match());
    }

    #[test]
    fn test_match_is_idempotent() {
        let index = index();
        let record = record("g", "Textile waste in Europe", None, None);
        assert_eq!(match_record(&record, &index), match_record(&record, &index));
    }

    #[test]
    fn test_find_conflict() {
        let index = index();
        let conflicting = record(
            "h",
            "",
            Some("10.1000/tex"),
            Some("https://fashionrevolution.org"),
        );
        let conflict = find_conflict(&conflicting, &index).unwrap();
        assert_eq!(conflict.doi_entry, "DOI-ENTRY");
        assert_eq!(conflict.url_entry, "URL-ENTRY");

        // the matcher still answers by DOI, the conflict is reported separately
        assert_eq!(match_record(&conflicting, &index).basis, MatchBasis::Doi);

        let agreeing = record("i", "", Some("10.1000/tex"), Some("https://doi.org/10.1000/tex"));
        assert_eq!(find_conflict(&agreeing, &index), None);

        let url_unknown = record("j", "", Some("10.1000/tex"), Some("https://example.org"));
        assert_eq!(find_conflict(&url_unknown, &index), None);
    }

    #[test]
    fn test_match_all_keeps_order() {
        let records = vec![
            record("1", "", None, Some("https://fashionrevolution.org")),
            record("2", "nothing", None, None),
            record("3", "", Some("10.1000/tex"), None),
        ];
        let index = index();

        for matcher in [Matcher::new(), Matcher::new().with_parallel(true)] {
            let results = matcher.match_all(&records, Some(&index));
            let keys: Vec<_> = results.iter().map(|r| r.record_key.as_str()).collect();
            assert_eq!(keys, vec!["1", "2", "3"]);
            assert_eq!(results[0].basis, MatchBasis::NormalizedUrl);
            assert_eq!(results[1].basis, MatchBasis::None);
            assert_eq!(results[2].basis, MatchBasis::Doi);
        }

        let results = Matcher::new().match_all(&records, None);
        assert!(results.iter().all(|r| !r.is_match()));
    }

    #[test]
    fn test_match_result_serialization() {
        let json = serde_json::to_value(MatchResult::unmatched("k")).unwrap();
        assert_eq!(json["basis"], "NONE");
        assert_eq!(json["matched_id"], serde_json::Value::Null);
    }
}
