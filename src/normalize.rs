//! Identifier normalization.
//!
//! Converts raw URLs and identifiers into canonical keys that can be compared
//! with plain string equality. Every function here is pure and total.
//!
//! | Input                                          | Canonical key                |
//! |------------------------------------------------|------------------------------|
//! | `https://arxiv.org/pdf/2401.12345v2.pdf`       | `arxiv.org/abs/2401.12345`   |
//! | `http://dx.doi.org/10.1000/ABC`                | `doi.org/10.1000/abc`        |
//! | `https://www.amazon.de/Title/dp/1138021016?x`  | `amazon.com/dp/1138021016`   |
//! | `https://www.Example.org/Page/`                | `example.org/page`           |
//!
//! Only identifier-bearing hosts lose their query strings and fragments.
//! Generic URLs are compared as-is beyond scheme, `www.` and case, since
//! aggressive normalization of arbitrary pages produces false duplicates.

use crate::regex::Regex;
use crate::utils::{format_doi, strip_prefix_ignore_case};
use std::borrow::Cow;
use std::sync::LazyLock;

static ARXIV_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*[0-9])v[0-9]+$").unwrap());

static ARXIV_BARE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]{4}\.[0-9]{4,5}|[A-Za-z-]+(?:\.[A-Za-z-]+)?/[0-9]{7})(?:v[0-9]+)?$")
        .unwrap()
});

static ARXIV_DOI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.48550/arxiv\.(.+)$").unwrap());

static AMAZON_HOST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9-]+\.)?amazon\.(?:[a-z]{2,3})(?:\.[a-z]{2})?$").unwrap()
});

static ASIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)(?:dp|gp/product)/([A-Za-z0-9]{10})(?:[/?#]|$)").unwrap()
});

/// Normalizes a URL into a canonical comparable key.
///
/// Never fails: input that matches no identifier scheme comes back lower-cased
/// without scheme, `www.` or trailing slashes.
///
/// # Examples
///
/// ```
/// use bibsane::normalize_url;
///
/// assert_eq!(normalize_url("https://arxiv.org/pdf/2401.12345v2.pdf"), "arxiv.org/abs/2401.12345");
/// assert_eq!(normalize_url("http://dx.doi.org/10.1000/ABC"), "doi.org/10.1000/abc");
/// assert_eq!(
///     normalize_url("https://www.amazon.de/Some-Title/dp/1138021016?ref=xyz"),
///     "amazon.com/dp/1138021016"
/// );
/// assert_eq!(normalize_url("https://www.Example.org/Page/"), "example.org/page");
/// ```
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let stripped = strip_scheme_and_www(raw.trim());
    let stripped = stripped.trim_end_matches('/');

    let (host, path) = match stripped.split_once('/') {
        Some((host, path)) => (host.to_ascii_lowercase(), path),
        None => (stripped.to_ascii_lowercase(), ""),
    };

    if host == "arxiv.org" || host == "export.arxiv.org" {
        if let Some(id) = arxiv_id_from_path(path) {
            return format!("arxiv.org/abs/{}", id);
        }
    }

    if host == "doi.org" || host == "dx.doi.org" {
        if let Some(doi) = normalize_doi(strip_query_and_fragment(path)) {
            return format!("doi.org/{}", doi);
        }
    }

    if AMAZON_HOST_REGEX.is_match(&host) {
        if let Some(asin) = asin_from_path(path) {
            return format!("amazon.com/dp/{}", asin);
        }
    }

    stripped.to_lowercase()
}

/// Normalizes a DOI: resolver prefixes, `doi:` labels and `[doi]` suffixes are
/// removed, percent-encoding is undone and the result is lower-cased.
///
/// Returns `None` when the input does not contain a `10.<registrant>/<suffix>` DOI.
///
/// # Examples
///
/// ```
/// use bibsane::normalize_doi;
///
/// assert_eq!(normalize_doi("https://doi.org/10.1000/ABC%2Fdef").as_deref(), Some("10.1000/abc/def"));
/// assert_eq!(normalize_doi("not a doi"), None);
/// ```
#[must_use]
pub fn normalize_doi(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    format_doi(&decoded)
}

/// The canonical key for a record's identifiers.
///
/// A separately supplied DOI wins and is emitted as `doi.org/<doi>`; otherwise
/// the URL is normalized with [`normalize_url`].
#[must_use]
pub fn canonical_url(url: Option<&str>, doi: Option<&str>) -> Option<String> {
    if let Some(doi) = doi.and_then(normalize_doi) {
        return Some(format!("doi.org/{}", doi));
    }
    url.filter(|url| !url.trim().is_empty()).map(normalize_url)
}

/// Extracts a version-less arXiv identifier.
///
/// Accepts arXiv URLs in any of the abs/html/pdf forms, `arXiv:` prefixed or
/// bare identifiers, and arXiv DOIs (`10.48550/arXiv.<id>`).
///
/// # Examples
///
/// ```
/// use bibsane::normalize::arxiv_id;
///
/// assert_eq!(arxiv_id("https://arxiv.org/html/2401.12345v3").as_deref(), Some("2401.12345"));
/// assert_eq!(arxiv_id("arXiv:hep-th/9901001v1").as_deref(), Some("hep-th/9901001"));
/// assert_eq!(arxiv_id("10.48550/arXiv.2401.12345").as_deref(), Some("2401.12345"));
/// assert_eq!(arxiv_id("https://example.org/2401.12345"), None);
/// ```
#[must_use]
pub fn arxiv_id(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Some(doi) = normalize_doi(raw) {
        if let Some(caps) = ARXIV_DOI_REGEX.captures(&doi) {
            return Some(strip_arxiv_version(&caps[1]).to_string());
        }
    }

    let bare = strip_prefix_ignore_case(raw, "arxiv:").map_or(raw, str::trim_start);
    if ARXIV_BARE_ID_REGEX.is_match(bare) {
        return Some(strip_arxiv_version(bare).to_string());
    }

    normalize_url(raw)
        .strip_prefix("arxiv.org/abs/")
        .map(str::to_string)
}

/// Extracts the ASIN from an Amazon product URL on any marketplace.
///
/// # Examples
///
/// ```
/// use bibsane::normalize::asin;
///
/// assert_eq!(asin("https://www.amazon.co.uk/gp/product/b00zvA1234").as_deref(), Some("B00ZVA1234"));
/// assert_eq!(asin("https://example.org/dp/1138021016"), None);
/// ```
#[must_use]
pub fn asin(raw: &str) -> Option<String> {
    normalize_url(raw)
        .strip_prefix("amazon.com/dp/")
        .map(str::to_string)
}

fn strip_scheme_and_www(input: &str) -> &str {
    let input = strip_prefix_ignore_case(input, "https://")
        .or_else(|| strip_prefix_ignore_case(input, "http://"))
        .unwrap_or(input);
    strip_prefix_ignore_case(input, "www.").unwrap_or(input)
}

fn strip_query_and_fragment(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn strip_arxiv_version(id: &str) -> &str {
    ARXIV_VERSION_REGEX
        .captures(id)
        .and_then(|caps| caps.get(1))
        .map_or(id, |m| m.as_str())
}

fn arxiv_id_from_path(path: &str) -> Option<String> {
    let rest = ["abs/", "html/", "pdf/"]
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(path, prefix))?;

    let rest = strip_query_and_fragment(rest).trim_end_matches('/');
    let rest = strip_suffix_ignore_case(rest, ".pdf").unwrap_or(rest);
    let id = strip_arxiv_version(rest);

    (!id.is_empty()).then(|| id.to_string())
}

fn asin_from_path(path: &str) -> Option<String> {
    ASIN_REGEX
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

fn strip_suffix_ignore_case<'a>(input: &'a str, suffix: &str) -> Option<&'a str> {
    let split = input.len().checked_sub(suffix.len())?;
    let tail = input.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &input[..split])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case("10.1000/xyz123")]
    #[case("10.1038/NATURE12373")]
    #[case("10.1016/j.jclepro.2019.118901")]
    #[case("10.1002/(SICI)1097-4571(199806)49:8<693::AID-ASI4>3.0.CO;2-O")]
    fn test_doi_resolver_forms_agree(#[case] doi: &str) {
        let expected = format!("doi.org/{}", doi.to_lowercase());
        assert_eq!(normalize_url(&format!("https://doi.org/{}", doi)), expected);
        assert_eq!(normalize_url(&format!("http://dx.doi.org/{}", doi)), expected);
    }

    #[test]
    fn test_doi_url_encoding_is_undone() {
        assert_eq!(
            normalize_url("https://doi.org/10.1002%2F%28SICI%291097"),
            "doi.org/10.1002/(sici)1097"
        );
        assert_eq!(
            normalize_url("https://doi.org/10.1000/abc?download=true"),
            "doi.org/10.1000/abc"
        );
    }

    #[rstest]
    #[case("https://arxiv.org/abs/2401.12345")]
    #[case("https://arxiv.org/abs/2401.12345v1")]
    #[case("http://arxiv.org/html/2401.12345v3")]
    #[case("https://arxiv.org/pdf/2401.12345")]
    #[case("https://arxiv.org/pdf/2401.12345v2.pdf")]
    #[case("https://www.arxiv.org/abs/2401.12345/")]
    #[case("https://export.arxiv.org/abs/2401.12345v4")]
    #[case("https://arxiv.org/abs/2401.12345?context=cs")]
    fn test_arxiv_forms_collapse(#[case] url: &str) {
        assert_eq!(normalize_url(url), "arxiv.org/abs/2401.12345");
    }

    #[test]
    fn test_arxiv_old_style_identifier() {
        assert_eq!(
            normalize_url("https://arxiv.org/pdf/hep-th/9901001v2.pdf"),
            "arxiv.org/abs/hep-th/9901001"
        );
        assert_eq!(
            normalize_url("https://arxiv.org/abs/math.GT/0309136"),
            "arxiv.org/abs/math.GT/0309136"
        );
    }

    #[test]
    fn test_arxiv_listing_pages_stay_generic() {
        assert_eq!(
            normalize_url("https://arxiv.org/list/cs.AI/recent"),
            "arxiv.org/list/cs.ai/recent"
        );
    }

    #[rstest]
    #[case("https://www.amazon.de/Circular-Economy-Handbook/dp/1138021016?ref=xyz")]
    #[case("https://amazon.com/dp/1138021016")]
    #[case("https://www.amazon.co.uk/gp/product/1138021016/ref=ppx_yo_dt_b")]
    #[case("http://smile.amazon.com/dp/1138021016/")]
    #[case("https://www.amazon.fr/-/en/dp/1138021016#reviews")]
    fn test_amazon_is_tld_invariant(#[case] url: &str) {
        assert_eq!(normalize_url(url), "amazon.com/dp/1138021016");
    }

    #[test]
    fn test_amazon_without_asin_stays_generic() {
        assert_eq!(
            normalize_url("https://www.amazon.de/s?k=circular+economy"),
            "amazon.de/s?k=circular+economy"
        );
    }

    #[rstest]
    #[case("https://www.Example.org/Page/", "example.org/page")]
    #[case("HTTP://WWW.EXAMPLE.ORG", "example.org")]
    #[case("example.org/a?b=1#frag", "example.org/a?b=1#frag")]
    #[case("  https://eea.europa.eu/publications/  ", "eea.europa.eu/publications")]
    #[case("https://example.org/a//", "example.org/a")]
    #[case("", "")]
    fn test_generic_urls(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(normalize_url(url), expected);
    }

    #[test]
    fn test_normalize_url_is_idempotent() {
        for url in [
            "https://arxiv.org/pdf/2401.12345v2.pdf",
            "https://doi.org/10.1000/ABC",
            "https://www.amazon.de/dp/1138021016?ref=xyz",
            "https://www.Example.org/Page/?q=1",
            "https://example.org/a//",
        ] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once);
        }
    }

    #[test]
    fn test_canonical_url_prefers_doi() {
        assert_eq!(
            canonical_url(Some("https://example.org/x"), Some("DOI: 10.1000/ABC")).as_deref(),
            Some("doi.org/10.1000/abc")
        );
        assert_eq!(
            canonical_url(Some("https://example.org/x"), Some("n/a")).as_deref(),
            Some("example.org/x")
        );
        assert_eq!(canonical_url(Some("   "), None), None);
        assert_eq!(canonical_url(None, None), None);
    }

    #[rstest]
    #[case("https://arxiv.org/abs/2401.12345v2", Some("2401.12345"))]
    #[case("arXiv:2401.12345", Some("2401.12345"))]
    #[case("2401.12345v9", Some("2401.12345"))]
    #[case("https://doi.org/10.48550/arXiv.2401.12345", Some("2401.12345"))]
    #[case("10.1000/abc", None)]
    #[case("https://example.org/abs/2401.12345", None)]
    fn test_arxiv_id(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(arxiv_id(raw).as_deref(), expected);
    }
}
