//! CSL JSON export parser.
//!
//! Reads the flat list-of-records format written by Zotero's "Export Library"
//! (CSL JSON) and similar tools. Both a bare array and an object with an
//! `items` array are accepted, and field names are matched leniently so
//! hand-written exports with `key`, `authors` or `doi` also load.
//!
//! # Example
//!
//! ```
//! use bibsane::index::{CslJsonParser, IndexParser};
//!
//! let input = r#"{"items": [{"key": "X1", "title": "Example",
//!                 "author": [{"family": "Smith", "given": "John"}],
//!                 "URL": "https://example.org"}]}"#;
//!
//! let entries = CslJsonParser::new().parse(input).unwrap();
//! assert_eq!(entries[0].id, "X1");
//! assert_eq!(entries[0].authors, vec!["Smith, John"]);
//! ```

use crate::index::{IndexEntry, IndexParser};
use crate::utils::{format_author_name, parse_year};
use crate::{EntryType, IndexBuildError};
use serde_json::{Map, Value};

const ID_FIELDS: &[&str] = &["id", "key", "identifier", "citationKey", "citation-key"];
const TITLE_FIELDS: &[&str] = &["title"];
const AUTHOR_FIELDS: &[&str] = &["author", "authors", "creators"];
const DATE_FIELDS: &[&str] = &["issued", "date", "year"];
const DOI_FIELDS: &[&str] = &["DOI", "doi"];
const URL_FIELDS: &[&str] = &["URL", "url"];
const TYPE_FIELDS: &[&str] = &["type", "itemType"];

/// Parser for CSL JSON exports.
#[derive(Debug, Default, Clone)]
pub struct CslJsonParser;

impl CslJsonParser {
    /// Creates a new CSL JSON parser instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_item(position: usize, item: &Value) -> Result<IndexEntry, IndexBuildError> {
        let object = item.as_object().ok_or_else(|| {
            IndexBuildError::InvalidFormat(format!("record {} is not a JSON object", position))
        })?;

        Ok(IndexEntry {
            id: first_field(object, ID_FIELDS)
                .and_then(scalar_to_string)
                .unwrap_or_default(),
            title: first_field(object, TITLE_FIELDS)
                .and_then(scalar_to_string)
                .unwrap_or_default(),
            authors: first_field(object, AUTHOR_FIELDS)
                .map(parse_names)
                .unwrap_or_default(),
            year: first_field(object, DATE_FIELDS).and_then(parse_date),
            doi: first_field(object, DOI_FIELDS).and_then(scalar_to_string),
            url: first_field(object, URL_FIELDS).and_then(scalar_to_string),
            normalized_url: None,
            entry_type: first_field(object, TYPE_FIELDS)
                .and_then(Value::as_str)
                .map(EntryType::from_type_name)
                .unwrap_or_default(),
        })
    }
}

impl IndexParser for CslJsonParser {
    fn parse(&self, input: &str) -> Result<Vec<IndexEntry>, IndexBuildError> {
        let document: Value = serde_json::from_str(input)?;

        let items = match &document {
            Value::Array(items) => items,
            Value::Object(object) => object
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    IndexBuildError::InvalidFormat(
                        "expected a list of records or an object with an \"items\" list".into(),
                    )
                })?,
            _ => {
                return Err(IndexBuildError::InvalidFormat(
                    "expected a list of records".into(),
                ));
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(position, item)| Self::parse_item(position, item))
            .collect()
    }
}

fn first_field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parses CSL name objects, Zotero creator objects or plain strings.
fn parse_names(value: &Value) -> Vec<String> {
    let Some(names) = value.as_array() else {
        return scalar_to_string(value).into_iter().collect();
    };

    names
        .iter()
        .filter_map(|name| match name {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(parts) => {
                let text = |keys: &[&str]| {
                    first_field(parts, keys)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let literal = text(&["literal", "name"]);
                if literal.is_empty() {
                    Some(format_author_name(
                        &text(&["family", "lastName"]),
                        &text(&["given", "firstName"]),
                    ))
                } else {
                    Some(literal.trim().to_string())
                }
            }
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Reads a year from CSL `date-parts`, a `raw`/`literal` date, or a plain value.
fn parse_date(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|year| i32::try_from(year).ok()),
        Value::String(s) => parse_year(s),
        Value::Object(date) => date
            .get("date-parts")
            .and_then(|parts| parts.get(0))
            .and_then(|first| first.get(0))
            .and_then(parse_date)
            .or_else(|| first_field(date, &["raw", "literal"]).and_then(parse_date)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_csl_json_list() {
        let input = r#"[
            {
                "id": "http://zotero.org/users/1/items/ABCD1234",
                "type": "article-journal",
                "title": "Fashion and the circular economy",
                "author": [
                    {"family": "Doe", "given": "Jane"},
                    {"literal": "European Environment Agency"}
                ],
                "issued": {"date-parts": [["2021", 5]]},
                "DOI": "10.1000/FASHION",
                "URL": "https://example.org/fashion"
            },
            {
                "id": 42,
                "type": "webpage",
                "title": "Second",
                "issued": {"raw": "March 2019"}
            }
        ]"#;

        let entries = CslJsonParser::new().parse(input).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id, "http://zotero.org/users/1/items/ABCD1234");
        assert_eq!(first.entry_type, EntryType::Article);
        assert_eq!(first.authors, vec!["Doe, Jane", "European Environment Agency"]);
        assert_eq!(first.year, Some(2021));
        assert_eq!(first.doi.as_deref(), Some("10.1000/FASHION"));
        assert_eq!(first.url.as_deref(), Some("https://example.org/fashion"));

        let second = &entries[1];
        assert_eq!(second.id, "42");
        assert_eq!(second.entry_type, EntryType::Webpage);
        assert_eq!(second.year, Some(2019));
        assert!(second.authors.is_empty());
    }

    #[test]
    fn test_parse_lenient_field_names() {
        let input = r#"{"items": [{
            "key": "K1",
            "itemType": "book",
            "title": "A Book",
            "authors": ["Smith, John", "  "],
            "year": 1999,
            "doi": null,
            "url": "https://amazon.de/dp/1138021016"
        }]}"#;

        let entries = CslJsonParser::new().parse(input).unwrap();
        assert_eq!(entries[0].id, "K1");
        assert_eq!(entries[0].entry_type, EntryType::Book);
        assert_eq!(entries[0].authors, vec!["Smith, John"]);
        assert_eq!(entries[0].year, Some(1999));
        assert_eq!(entries[0].doi, None);
    }

    #[test]
    fn test_parse_rejects_non_list() {
        let result = CslJsonParser::new().parse(r#""just a string""#);
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));

        let result = CslJsonParser::new().parse(r#"{"records": []}"#);
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));

        let result = CslJsonParser::new().parse(r#"[1, 2]"#);
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_reports_syntax_error_line() {
        let result = CslJsonParser::new().parse("[\n{\"id\": \"A\",\n\"title\": }\n]");
        match result {
            Err(IndexBuildError::MalformedInput { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
