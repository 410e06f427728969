//! Zotero RDF export parser.
//!
//! The RDF export is a graph of typed nodes under a single `rdf:RDF` root.
//! Every top-level node is a candidate item; nested nodes (journals, people,
//! URIs) only contribute to the item that contains them. Attachments, notes,
//! collections and stand-alone container nodes are skipped.
//!
//! # Example
//!
//! ```
//! use bibsane::index::{IndexParser, RdfIndexParser};
//!
//! let input = r##"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
//!     xmlns:z="http://www.zotero.org/namespaces/export#"
//!     xmlns:dc="http://purl.org/dc/elements/1.1/"
//!     xmlns:bib="http://purl.org/net/biblio#">
//!   <bib:Article rdf:about="#item_1">
//!     <z:itemType>journalArticle</z:itemType>
//!     <dc:title>Example Title</dc:title>
//!     <dc:date>2021</dc:date>
//!   </bib:Article>
//! </rdf:RDF>"##;
//!
//! let entries = RdfIndexParser::new().parse(input).unwrap();
//! assert_eq!(entries[0].id, "#item_1");
//! assert_eq!(entries[0].title, "Example Title");
//! ```

use crate::index::{IndexEntry, IndexParser};
use crate::utils::{format_author_name, parse_year};
use crate::{EntryType, IndexBuildError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Top-level node names that never describe a citable item.
const SKIPPED_NODES: &[&str] = &[
    "z:Attachment",
    "bib:Memo",
    "z:Collection",
    "bib:Journal",
    "bib:Periodical",
    "bib:Series",
    "foaf:Person",
    "foaf:Organization",
];

/// Zotero item types that are not citable items.
const SKIPPED_ITEM_TYPES: &[&str] = &["attachment", "note"];

/// Parser for Zotero RDF exports.
#[derive(Debug, Default, Clone)]
pub struct RdfIndexParser;

/// Fields collected from one top-level node.
#[derive(Debug, Default)]
struct NodeDraft {
    name: String,
    about: Option<String>,
    item_type: Option<String>,
    title: String,
    date: Option<String>,
    doi: Option<String>,
    url: Option<String>,
    authors: Vec<(String, String)>,
}

impl RdfIndexParser {
    /// Creates a new RDF parser instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl NodeDraft {
    fn new(name: String, start: &BytesStart) -> Result<Self, IndexBuildError> {
        Ok(Self {
            name,
            about: attribute(start, b"rdf:about")?,
            ..Default::default()
        })
    }

    /// Called for each element opened inside the node; `path` excludes the node itself.
    fn on_start(&mut self, path: &[String], name: &str) {
        if name == "foaf:Person" && path.iter().any(|p| p == "bib:authors") {
            self.authors.push((String::new(), String::new()));
        }
    }

    /// Called for each text run inside the node; `path` excludes the node itself.
    fn on_text(&mut self, path: &[String], text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match path {
            [leaf] if leaf == "dc:title" && self.title.is_empty() => self.title = text.to_string(),
            [leaf] if leaf == "dc:date" => self.date = Some(text.to_string()),
            [leaf] if leaf == "z:itemType" => self.item_type = Some(text.to_string()),
            [leaf] if leaf == "dc:creator" => self.authors.push((text.to_string(), String::new())),
            [leaf] if leaf == "dc:identifier" => self.on_identifier(text),
            [first, .., last] if first == "dc:identifier" && last == "rdf:value" => {
                self.on_identifier(text)
            }
            [first, .., last] if first == "bib:authors" => {
                if let Some((family, given)) = self.authors.last_mut() {
                    match last.as_str() {
                        "foaf:surname" => *family = text.to_string(),
                        "foaf:givenName" | "foaf:givenname" => *given = text.to_string(),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn on_identifier(&mut self, text: &str) {
        let lower = text.to_ascii_lowercase();
        if lower.starts_with("doi") || lower.starts_with("10.") {
            self.doi.get_or_insert_with(|| text.to_string());
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            self.url.get_or_insert_with(|| text.to_string());
        }
    }

    fn into_entry(self) -> Option<IndexEntry> {
        if SKIPPED_NODES.contains(&self.name.as_str()) {
            return None;
        }
        if let Some(item_type) = &self.item_type {
            if SKIPPED_ITEM_TYPES.contains(&item_type.as_str()) {
                return None;
            }
        }
        if self.title.is_empty() && self.doi.is_none() && self.url.is_none() {
            return None;
        }

        let entry_type = EntryType::from_type_name(self.item_type.as_deref().unwrap_or(&self.name));
        Some(IndexEntry {
            id: self.about.unwrap_or_default(),
            title: self.title,
            authors: self
                .authors
                .iter()
                .map(|(family, given)| format_author_name(family, given))
                .filter(|name| !name.is_empty())
                .collect(),
            year: self.date.as_deref().and_then(parse_year),
            doi: self.doi,
            url: self.url,
            normalized_url: None,
            entry_type,
        })
    }
}

fn attribute(start: &BytesStart, key: &[u8]) -> Result<Option<String>, IndexBuildError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| IndexBuildError::InvalidFormat(e.to_string()))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| IndexBuildError::InvalidFormat(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn qualified_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Convert buffer position to approximate line number
fn buffer_position_to_line_number(content: &str, pos: usize) -> usize {
    let pos = pos.min(content.len());
    content.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count() + 1
}

impl IndexParser for RdfIndexParser {
    fn parse(&self, input: &str) -> Result<Vec<IndexEntry>, IndexBuildError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut node: Option<NodeDraft> = None;
        let mut entries = Vec::new();
        let mut saw_root = false;

        loop {
            let position = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| IndexBuildError::MalformedInput {
                message: e.to_string(),
                line: buffer_position_to_line_number(input, position),
            })?;

            match event {
                Event::Start(e) => {
                    let name = qualified_name(&e);
                    match path.len() {
                        0 if name == "rdf:RDF" => saw_root = true,
                        0 => {
                            return Err(IndexBuildError::InvalidFormat(format!(
                                "expected an rdf:RDF root element, found {}",
                                name
                            )));
                        }
                        1 => node = Some(NodeDraft::new(name.clone(), &e)?),
                        _ => {
                            if let Some(draft) = node.as_mut() {
                                draft.on_start(&path[2..], &name);
                            }
                        }
                    }
                    path.push(name);
                }
                Event::Text(e) if path.len() > 2 => {
                    let text = e
                        .unescape()
                        .map_err(|e| IndexBuildError::MalformedInput {
                            message: e.to_string(),
                            line: buffer_position_to_line_number(input, position),
                        })?;
                    if let Some(draft) = node.as_mut() {
                        draft.on_text(&path[2..], &text);
                    }
                }
                Event::CData(e) if path.len() > 2 => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    if let Some(draft) = node.as_mut() {
                        draft.on_text(&path[2..], &text);
                    }
                }
                Event::End(_) => {
                    path.pop();
                    if path.len() == 1 {
                        if let Some(entry) = node.take().and_then(NodeDraft::into_entry) {
                            entries.push(entry);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(IndexBuildError::InvalidFormat(
                "missing rdf:RDF root element".into(),
            ));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ZOTERO_EXPORT: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF
 xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
 xmlns:z="http://www.zotero.org/namespaces/export#"
 xmlns:dcterms="http://purl.org/dc/terms/"
 xmlns:dc="http://purl.org/dc/elements/1.1/"
 xmlns:bib="http://purl.org/net/biblio#"
 xmlns:foaf="http://xmlns.com/foaf/0.1/"
 xmlns:link="http://purl.org/rss/1.0/modules/link/">
    <bib:Article rdf:about="http://zotero.org/users/1/items/ABCD1234">
        <z:itemType>journalArticle</z:itemType>
        <dcterms:isPartOf>
            <bib:Journal>
                <dc:title>Journal of Cleaner Production</dc:title>
            </bib:Journal>
        </dcterms:isPartOf>
        <bib:authors>
            <rdf:Seq>
                <rdf:li>
                    <foaf:Person>
                        <foaf:surname>Doe</foaf:surname>
                        <foaf:givenName>Jane</foaf:givenName>
                    </foaf:Person>
                </rdf:li>
                <rdf:li>
                    <foaf:Person>
                        <foaf:surname>Smith</foaf:surname>
                    </foaf:Person>
                </rdf:li>
            </rdf:Seq>
        </bib:authors>
        <link:link rdf:resource="#item_9"/>
        <dc:title>Textile waste &amp; circularity</dc:title>
        <dc:date>2020-03-01</dc:date>
        <dc:identifier>DOI 10.1000/TEX</dc:identifier>
        <dc:identifier>
            <dcterms:URI>
                <rdf:value>https://example.org/tex</rdf:value>
            </dcterms:URI>
        </dc:identifier>
    </bib:Article>
    <z:Attachment rdf:about="#item_9">
        <z:itemType>attachment</z:itemType>
        <dc:title>Full Text PDF</dc:title>
    </z:Attachment>
    <bib:Document rdf:about="http://zotero.org/users/1/items/EFGH5678">
        <z:itemType>webpage</z:itemType>
        <dc:title><![CDATA[Fashion Revolution]]></dc:title>
        <dc:identifier>
            <dcterms:URI>
                <rdf:value>https://www.fashionrevolution.org/</rdf:value>
            </dcterms:URI>
        </dc:identifier>
    </bib:Document>
    <bib:Journal rdf:about="urn:issn:0959-6526">
        <dc:title>Journal of Cleaner Production</dc:title>
    </bib:Journal>
</rdf:RDF>
"##;

    #[test]
    fn test_parse_zotero_rdf() {
        let entries = RdfIndexParser::new().parse(ZOTERO_EXPORT).unwrap();
        assert_eq!(entries.len(), 2);

        let article = &entries[0];
        assert_eq!(article.id, "http://zotero.org/users/1/items/ABCD1234");
        assert_eq!(article.title, "Textile waste & circularity");
        assert_eq!(article.entry_type, EntryType::Article);
        assert_eq!(article.authors, vec!["Doe, Jane", "Smith"]);
        assert_eq!(article.year, Some(2020));
        assert_eq!(article.doi.as_deref(), Some("DOI 10.1000/TEX"));
        assert_eq!(article.url.as_deref(), Some("https://example.org/tex"));

        let page = &entries[1];
        assert_eq!(page.title, "Fashion Revolution");
        assert_eq!(page.entry_type, EntryType::Webpage);
        assert_eq!(page.url.as_deref(), Some("https://www.fashionrevolution.org/"));
    }

    #[test]
    fn test_rejects_non_rdf_root() {
        let result = RdfIndexParser::new().parse("<xml><records/></xml>");
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_missing_root() {
        let result = RdfIndexParser::new().parse("just text");
        assert!(matches!(result, Err(IndexBuildError::InvalidFormat(_))));
    }

    #[test]
    fn test_reports_malformed_xml() {
        let input = "<rdf:RDF>\n<bib:Article>\n<dc:title>Broken</dc:date>\n</rdf:RDF>";
        let result = RdfIndexParser::new().parse(input);
        assert!(matches!(result, Err(IndexBuildError::MalformedInput { .. })));
    }

    #[test]
    fn test_buffer_position_to_line_number() {
        let content = "a\nb\nc";
        assert_eq!(buffer_position_to_line_number(content, 0), 1);
        assert_eq!(buffer_position_to_line_number(content, 2), 2);
        assert_eq!(buffer_position_to_line_number(content, 100), 3);
    }
}
