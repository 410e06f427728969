//! Title and author classification.
//!
//! Pure predicates flagging low-quality metadata: titles that are really a
//! domain name, titles produced by fallback record templates, and author
//! fields holding an organization. [`normalize_title`] builds the lossy key
//! used for title matching and duplicate detection.

use crate::regex::{Captures, Regex};
use std::sync::LazyLock;

static DOMAIN_TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:www\.)?(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:com|org|net|edu|gov|int|mil|info|biz|io|ai|co|eu|de|uk|fr|it|es|nl|be|ch|at|se|no|dk|fi|pl|pt|ie|ca|us|au|nz|jp|cn|in|br|ru|za|dev|app|news|ngo|global)$",
    )
    .unwrap()
});

static UNICODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<U\+([0-9A-Fa-f]+)>").unwrap());

static HTML_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?(?:sup|sub|inf|i|b|em|strong|span)>").unwrap());

static LATEX_COMMAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+\*?|\\[^A-Za-z\s]").unwrap());

const HTML_REPLACEMENTS: [(&str, &str); 6] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
];

/// Template prefixes written by fallback record-creation paths.
const STUB_TITLE_PREFIXES: [&str; 4] = [
    "web page by ",
    "webpage by ",
    "added from url:",
    "imported from url:",
];

/// Words marking an author string as an organization rather than a person.
const ORGANIZATION_KEYWORDS: [&str; 33] = [
    "commission",
    "foundation",
    "council",
    "agency",
    "institute",
    "institution",
    "organisation",
    "organization",
    "association",
    "ministry",
    "department",
    "office",
    "authority",
    "parliament",
    "secretariat",
    "programme",
    "federation",
    "alliance",
    "coalition",
    "consortium",
    "initiative",
    "network",
    "forum",
    "bank",
    "union",
    "society",
    "university",
    "centre",
    "center",
    "board",
    "committee",
    "campaign",
    "observatory",
];

/// Returns true if the text is a bare hostname such as `fashionrevolution.org`.
///
/// Catches titles that were filled with the source URL's domain instead of the
/// work's real title.
///
/// # Examples
///
/// ```
/// use bibsane::is_domain_title;
///
/// assert!(is_domain_title("fashionrevolution.org"));
/// assert!(is_domain_title("Amazon.de"));
/// assert!(!is_domain_title("Circular economy in Europe"));
/// ```
#[must_use]
pub fn is_domain_title(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    !text.is_empty() && DOMAIN_TITLE_REGEX.is_match(&text)
}

/// Returns true if the text starts with a fallback template prefix such as
/// `Web page by ` or `Added from URL:`, ignoring case.
#[must_use]
pub fn is_stub_title(text: &str) -> bool {
    let text = text.trim_start().to_lowercase();
    STUB_TITLE_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

/// Returns true if a single author string names an organization.
///
/// Keywords match whole words only, ignoring case, so "European Commission"
/// qualifies while "Bankston, Jane" does not.
#[must_use]
pub fn is_organization_author(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| ORGANIZATION_KEYWORDS.contains(&word))
}

/// Builds the title matching key.
///
/// Decodes `<U+XXXX>` escapes and HTML entities, drops inline HTML tags and
/// LaTeX commands and braces, lower-cases, removes punctuation and collapses
/// whitespace. Dashes and slashes separate words. The result is never shown
/// to a human.
///
/// # Examples
///
/// ```
/// use bibsane::normalize_title;
///
/// assert_eq!(normalize_title("{Deep} Learning: A \\emph{Review}!"), "deep learning a review");
/// assert_eq!(normalize_title("Schr\\\"{o}dinger's   cat"), "schrodingers cat");
/// ```
#[must_use]
pub fn normalize_title(text: &str) -> String {
    let mut s = convert_unicode_string(text);
    for (from, to) in HTML_REPLACEMENTS {
        s = s.replace(from, to);
    }
    let s = HTML_TAG_REGEX.replace_all(&s, "");
    let s = LATEX_COMMAND_REGEX.replace_all(&s, "");

    let cleaned: String = s
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '-' | '\u{2010}'..='\u{2015}' | '/' => Some(' '),
            c if c.is_alphanumeric() || c.is_whitespace() => Some(c),
            _ => None,
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn convert_unicode_string(input: &str) -> String {
    UNICODE_REGEX
        .replace_all(input, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}
