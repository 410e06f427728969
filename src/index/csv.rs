//! CSV export parser with configurable headers.
//!
//! The default header mapping follows Zotero's CSV export (`Key`, `Item Type`,
//! `Publication Year`, `Author`, `Title`, `DOI`, `Url`, `Date`), with common
//! aliases for hand-made spreadsheets.
//!
//! # Example
//!
//! ```
//! use bibsane::index::{CsvIndexParser, IndexParser};
//!
//! let input = "Key,Title,Author,Publication Year,DOI\n\
//!              ABCD1234,Example Paper,\"Smith, John; Doe, Jane\",2023,10.1000/xyz";
//!
//! let entries = CsvIndexParser::new().parse(input).unwrap();
//! assert_eq!(entries[0].title, "Example Paper");
//! assert_eq!(entries[0].authors, vec!["Smith, John", "Doe, Jane"]);
//! ```

use crate::index::{IndexEntry, IndexParser};
use crate::utils::{parse_year, split_authors};
use crate::{EntryType, IndexBuildError};
use ::csv::{ReaderBuilder, StringRecord};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;

/// Default header mappings for common CSV column names
const DEFAULT_HEADERS: &[(&str, &[&str])] = &[
    ("id", &["key", "id", "citation key", "identifier"]),
    ("title", &["title", "article title"]),
    ("authors", &["author", "authors", "creator", "creators"]),
    ("year", &["publication year", "year", "pub year"]),
    ("date", &["date", "publication date"]),
    ("doi", &["doi", "digital object identifier"]),
    ("url", &["url", "link", "web link"]),
    ("entry_type", &["item type", "type", "entry type"]),
];

/// Configuration for CSV index parsing with custom header mappings.
///
/// # Examples
///
/// ```
/// use bibsane::index::CsvConfig;
///
/// let mut config = CsvConfig::new();
/// config.set_header_mapping("title", vec!["Werktitel".to_string()]);
/// config.set_delimiter(b';').set_author_separator('|');
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Header aliases per index field
    header_map: HashMap<String, Vec<String>>,
    /// Delimiter to use for parsing the CSV
    delimiter: u8,
    /// Separator between authors inside the author column
    author_separator: char,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvConfig {
    /// Creates a new CSV configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        let mut config = Self {
            header_map: HashMap::new(),
            delimiter: b',',
            author_separator: ';',
        };
        config.set_default_headers();
        config
    }

    fn set_default_headers(&mut self) {
        for (field, aliases) in DEFAULT_HEADERS {
            self.header_map.insert(
                field.to_string(),
                aliases.iter().map(|s| s.to_string()).collect(),
            );
        }
    }

    /// Sets a custom header mapping
    pub fn set_header_mapping(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field.to_string(), aliases);
        self
    }

    /// Sets the delimiter character
    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the separator between authors in the author column
    pub fn set_author_separator(&mut self, separator: char) -> &mut Self {
        self.author_separator = separator;
        self
    }

    /// Finds the field name for a given header
    fn get_field_for_header(&self, header: &str) -> Option<&str> {
        let header = header.trim().to_lowercase();
        self.header_map
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.to_lowercase() == header))
            .map(|(field, _)| field.as_str())
    }
}

/// Parser for CSV exports of a reference library.
#[derive(Debug, Clone, Default)]
pub struct CsvIndexParser {
    config: CsvConfig,
}

impl CsvIndexParser {
    /// Creates a new CSV parser with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CsvConfig::new(),
        }
    }

    /// Creates a new CSV parser with custom configuration
    #[must_use]
    pub fn with_config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }

    fn parse_record(&self, fields: &[Option<&str>], record: &StringRecord) -> IndexEntry {
        let mut entry = IndexEntry::default();
        let mut date = None;

        for (field, value) in fields.iter().zip(record.iter()) {
            let value = value.trim();
            let Some(field) = field else { continue };
            if value.is_empty() {
                continue;
            }

            match *field {
                "id" => entry.id = value.to_string(),
                "title" => entry.title = value.to_string(),
                "authors" => entry.authors = split_authors(value, self.config.author_separator),
                "year" => entry.year = parse_year(value),
                "date" => date = parse_year(value),
                "doi" => entry.doi = Some(value.to_string()),
                "url" => entry.url = Some(value.to_string()),
                "entry_type" => entry.entry_type = EntryType::from_type_name(value),
                _ => {}
            }
        }

        entry.year = entry.year.or(date);
        entry
    }
}

impl IndexParser for CsvIndexParser {
    fn parse(&self, input: &str) -> Result<Vec<IndexEntry>, IndexBuildError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(input.as_bytes());

        let headers = reader.headers()?.clone();
        let fields: Vec<Option<&str>> = headers
            .iter()
            .map(|header| self.config.get_field_for_header(header))
            .collect();

        if !fields.contains(&Some("title")) {
            return Err(IndexBuildError::InvalidFormat(format!(
                "CSV export has no title column (headers: {})",
                headers.iter().collect::<Vec<_>>().join(", ")
            )));
        }
        debug!("CSV index columns: {:?}", fields);

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            entries.push(self.parse_record(&fields, &record));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_zotero_csv() {
        let input = r#""Key","Item Type","Publication Year","Author","Title","DOI","Url","Date"
"ABCD1234","journalArticle","2020","Doe, Jane; Smith, John","Textile waste in Europe","10.1000/TEX","https://example.org/tex","2020-03-01"
"EFGH5678","webpage","","European Commission","Circular economy action plan","","https://ec.europa.eu/ceap","March 2021"
"#;

        let entries = CsvIndexParser::new().parse(input).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].id, "ABCD1234");
        assert_eq!(entries[0].entry_type, EntryType::Article);
        assert_eq!(entries[0].authors, vec!["Doe, Jane", "Smith, John"]);
        assert_eq!(entries[0].year, Some(2020));
        assert_eq!(entries[0].doi.as_deref(), Some("10.1000/TEX"));

        assert_eq!(entries[1].entry_type, EntryType::Webpage);
        assert_eq!(entries[1].authors, vec!["European Commission"]);
        assert_eq!(entries[1].year, Some(2021));
        assert_eq!(entries[1].doi, None);
    }

    #[test]
    fn test_publication_title_is_not_the_title() {
        let input = r#""Key","Item Type","Title","Publication Title","Url"
"K1","journalArticle","Textile waste in Europe","Journal of Cleaner Production","https://example.org/tex"
"#;

        let entries = CsvIndexParser::new().parse(input).unwrap();
        assert_eq!(entries[0].title, "Textile waste in Europe");

        let input = "Key,Publication Title\nK2,Journal of Cleaner Production\n";
        let result = CsvIndexParser::new().parse(input);
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));
    }

    #[test]
    fn test_custom_config() {
        let input = "Schluessel;Werktitel;Jahr\nK1;Kreislaufwirtschaft;2018\n";

        let mut config = CsvConfig::new();
        config
            .set_delimiter(b';')
            .set_header_mapping("id", vec!["Schluessel".to_string()])
            .set_header_mapping("title", vec!["Werktitel".to_string()])
            .set_header_mapping("year", vec!["Jahr".to_string()]);

        let entries = CsvIndexParser::new().with_config(config).parse(input).unwrap();
        assert_eq!(entries[0].id, "K1");
        assert_eq!(entries[0].title, "Kreislaufwirtschaft");
        assert_eq!(entries[0].year, Some(2018));
    }

    #[test]
    fn test_missing_title_column() {
        let result = CsvIndexParser::new().parse("Foo,Bar\n1,2\n");
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let entries = CsvIndexParser::new()
            .parse("Key,Title,Url\nA,Only title\n")
            .unwrap();
        assert_eq!(entries[0].title, "Only title");
        assert_eq!(entries[0].url, None);
    }
}
