//! Structured queries over an entry's embedded XHTML content.
//!
//! Zotero renders item fields as a table inside the Atom `<content>` element:
//!
//! ```text
//! <div xmlns="http://www.w3.org/1999/xhtml">
//!   <table>
//!     <tr class="creator"><th>Author</th><td>Smith</td></tr>
//!     <tr class="url"><th>URL</th><td>https://example.com</td></tr>
//!   </table>
//! </div>
//! ```

use scraper::{ElementRef, Html, Selector};

/// Namespace the content markup must be bound to.
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// One row of an item's metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// The row's `class` attribute (the remote field name).
    pub class: String,
    /// Text of the row's `<th>` cell.
    pub header: String,
    /// Text of the row's `<td>` cell.
    pub body: String,
}

impl FieldNode {
    pub fn new(class: impl Into<String>, header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            header: header.into(),
            body: body.into(),
        }
    }
}

/// A query selecting a cell (optionally a child of the cell) in the row
/// carrying a given class.
#[derive(Debug, Clone, Copy)]
pub struct ContentQuery {
    row_class: &'static str,
    cell: &'static str,
    child: Option<&'static str>,
}

impl ContentQuery {
    /// Body paragraph of a note child: `tr.note > td > p`.
    pub const NOTE: Self = Self {
        row_class: "note",
        cell: "td",
        child: Some("p"),
    };

    /// Link cell of an attachment: `tr.url > td`.
    pub const URL: Self = Self {
        row_class: "url",
        cell: "td",
        child: None,
    };

    fn css(&self) -> String {
        match self.child {
            Some(child) => format!("tr.{} > {} > {child}", self.row_class, self.cell),
            None => format!("tr.{} > {}", self.row_class, self.cell),
        }
    }
}

/// The XHTML content of one feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemContent {
    markup: String,
}

impl ItemContent {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Rows of the metadata table, in document order. Rows without a class
    /// cannot be mapped and are skipped.
    pub fn field_nodes(&self) -> Vec<FieldNode> {
        let Some(doc) = self.bound_document() else {
            return Vec::new();
        };

        let row_sel = Selector::parse("tr[class]").unwrap();
        let th_sel = Selector::parse("th").unwrap();
        let td_sel = Selector::parse("td").unwrap();

        doc.select(&row_sel)
            .filter_map(|row| {
                let class = row.value().attr("class")?.trim().to_string();
                let header = row.select(&th_sel).next().map(element_text).unwrap_or_default();
                let body = row.select(&td_sel).next().map(element_text).unwrap_or_default();
                Some(FieldNode {
                    class,
                    header,
                    body,
                })
            })
            .collect()
    }

    /// Text of the first element matching `query`, if any.
    pub fn first_text(&self, query: &ContentQuery) -> Option<String> {
        let doc = self.bound_document()?;
        let sel = Selector::parse(&query.css()).ok()?;
        doc.select(&sel)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    /// Parse the markup, rejecting content whose root declares a namespace
    /// other than XHTML.
    fn bound_document(&self) -> Option<Html> {
        if self.markup.trim().is_empty() {
            return None;
        }
        let doc = Html::parse_fragment(&self.markup);
        let root_sel = Selector::parse("div").unwrap();
        if let Some(root) = doc.select(&root_sel).next() {
            if let Some(ns) = root.value().attr("xmlns") {
                if ns != XHTML_NS {
                    tracing::debug!(namespace = ns, "content not bound to XHTML, ignoring");
                    return None;
                }
            }
        }
        Some(doc)
    }
}

/// Text of an element with surrounding whitespace trimmed. Inner line
/// breaks and spacing are kept.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"<div xmlns="http://www.w3.org/1999/xhtml"><table>
        <tr class="itemType"><th>Type</th><td>Book</td></tr>
        <tr class="creator"><th>Author</th><td>Smith, Jane</td></tr>
        <tr class="creator"><th>Editor</th><td>Doe,
            John</td></tr>
        <tr><th>Unlabelled</th><td>skip me</td></tr>
        <tr class="url"><th>URL</th><td>https://example.com/paper</td></tr>
    </table></div>"#;

    #[test]
    fn field_nodes_in_document_order() {
        let content = ItemContent::new(TABLE);
        let nodes = content.field_nodes();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], FieldNode::new("itemType", "Type", "Book"));
        assert_eq!(nodes[1], FieldNode::new("creator", "Author", "Smith, Jane"));
        assert_eq!(
            nodes[2],
            FieldNode::new("creator", "Editor", "Doe,\n            John")
        );
        assert_eq!(nodes[3].class, "url");
    }

    #[test]
    fn multi_line_body_keeps_line_breaks() {
        let content = ItemContent::new(
            "<div xmlns=\"http://www.w3.org/1999/xhtml\"><table>\
             <tr class=\"abstractNote\"><th>Abstract</th>\
             <td>\n  First paragraph.\n\nSecond   paragraph.\n</td></tr>\
             </table></div>",
        );
        let nodes = content.field_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].body, "First paragraph.\n\nSecond   paragraph.");
    }

    #[test]
    fn single_row_table() {
        let content = ItemContent::new(
            r#"<div><table><tr class="title"><th>Title</th><td>Only</td></tr></table></div>"#,
        );
        assert_eq!(content.field_nodes(), vec![FieldNode::new("title", "Title", "Only")]);
    }

    #[test]
    fn url_query_returns_first_match() {
        let content = ItemContent::new(TABLE);
        assert_eq!(
            content.first_text(&ContentQuery::URL).as_deref(),
            Some("https://example.com/paper")
        );
    }

    #[test]
    fn note_query_reads_first_paragraph() {
        let content = ItemContent::new(
            r#"<div xmlns="http://www.w3.org/1999/xhtml"><table>
                <tr class="note"><th>Note</th><td><p>hello</p><p>second</p></td></tr>
            </table></div>"#,
        );
        assert_eq!(content.first_text(&ContentQuery::NOTE).as_deref(), Some("hello"));
    }

    #[test]
    fn missing_match_is_none() {
        let content = ItemContent::new(TABLE);
        assert!(content.first_text(&ContentQuery::NOTE).is_none());
        assert!(ItemContent::default().first_text(&ContentQuery::URL).is_none());
        assert!(ItemContent::default().field_nodes().is_empty());
    }

    #[test]
    fn foreign_namespace_is_ignored() {
        let content = ItemContent::new(
            r#"<div xmlns="urn:example:other"><table>
                <tr class="url"><th>URL</th><td>https://example.com</td></tr>
            </table></div>"#,
        );
        assert!(content.first_text(&ContentQuery::URL).is_none());
        assert!(content.field_nodes().is_empty());
    }
}
