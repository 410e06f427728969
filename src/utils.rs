use crate::regex::Regex;
use std::sync::LazyLock;

static YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(1[5-9][0-9]{2}|20[0-9]{2})(?:[^0-9]|$)").unwrap());

/// Strips `prefix` from the start of `input`, ignoring ASCII case.
pub(crate) fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &input[prefix.len()..])
}

/// Formats a DOI string by removing resolver prefixes, labels and `[doi]` suffixes
///
/// # Arguments
///
/// * `doi_str` - The DOI string to format
pub(crate) fn format_doi(doi_str: &str) -> Option<String> {
    if doi_str.is_empty() {
        return None;
    }
    let doi = doi_str
        .trim()
        .trim_end_matches("[doi]")
        .trim()
        .replace(|c: char| c.is_whitespace(), "") // Remove all whitespace
        .to_lowercase();

    // Find the first occurrence of "10." which typically starts a DOI
    let pos = doi.find("10.")?;
    let doi = doi[pos..].trim_end_matches(['.', ',', ';']);
    if doi.len() <= "10.".len() || !doi.contains('/') {
        return None;
    }
    Some(doi.to_string())
}

/// Extracts a four digit publication year from a free-form date string
///
/// Handles `2023`, `2023-05-01`, `May 2023`, `2023/05` and similar.
pub(crate) fn parse_year(date: &str) -> Option<i32> {
    YEAR_REGEX
        .captures(date)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Joins family and given names into the `Family, Given` form used for raw author strings
pub(crate) fn format_author_name(family: &str, given: &str) -> String {
    match (family.trim(), given.trim()) {
        ("", "") => String::new(),
        (family, "") => family.to_string(),
        ("", given) => given.to_string(),
        (family, given) => format!("{}, {}", family, given),
    }
}

/// Splits a delimited author list into trimmed, non-empty author strings
pub(crate) fn split_authors(authors: &str, separator: char) -> Vec<String> {
    authors
        .split(separator)
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(String::from)
        .collect()
}
