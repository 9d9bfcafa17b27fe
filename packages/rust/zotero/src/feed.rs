//! Atom feed parsing: one feed page of Zotero items with its navigation links.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use zoteroimport_shared::{ImportError, Result};

use crate::content::{FieldNode, ItemContent};

/// Item type of file attachments.
pub const ITEM_TYPE_ATTACHMENT: &str = "attachment";

/// Item type of standalone and child notes.
pub const ITEM_TYPE_NOTE: &str = "note";

// ---------------------------------------------------------------------------
// RemoteItem
// ---------------------------------------------------------------------------

/// One item entry of a Zotero feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteItem {
    /// Item key, unique within the library.
    pub key: String,
    /// Zotero item type (`book`, `journalArticle`, `attachment`, `note`, ...).
    pub item_type: String,
    pub title: String,
    pub num_tags: u32,
    pub num_children: u32,
    pub content: ItemContent,
}

impl RemoteItem {
    pub fn is_attachment(&self) -> bool {
        self.item_type == ITEM_TYPE_ATTACHMENT
    }

    /// Rows of the item's metadata table.
    pub fn field_nodes(&self) -> Vec<FieldNode> {
        self.content.field_nodes()
    }
}

// ---------------------------------------------------------------------------
// FeedPage
// ---------------------------------------------------------------------------

/// Feed-level navigation links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedLinks {
    pub self_link: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

/// One page of a paginated feed.
#[derive(Debug, Clone)]
pub struct Feed<T> {
    pub links: FeedLinks,
    pub entries: Vec<T>,
}

/// A page of item entries.
pub type FeedPage = Feed<RemoteItem>;

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Self {
            links: FeedLinks::default(),
            entries: Vec::new(),
        }
    }
}

impl<T> Feed<T> {
    /// Offset for the following page, taken from the `start` query parameter
    /// of the "next" link. `None` when this page has no "next" link.
    pub fn next_start(&self) -> Result<Option<u64>> {
        let Some(next) = self.links.next.as_deref() else {
            return Ok(None);
        };
        start_param(next).map(Some)
    }

    /// Whether this page is the final one ("self" equals "last").
    pub fn is_last(&self) -> bool {
        match (&self.links.self_link, &self.links.last) {
            (Some(this), Some(last)) => this == last,
            _ => false,
        }
    }
}

/// Extract the `start` pagination offset from a feed link.
pub fn start_param(link: &str) -> Result<u64> {
    let url = Url::parse(link)
        .map_err(|e| ImportError::parse(format!("invalid feed link '{link}': {e}")))?;
    let start = url
        .query_pairs()
        .find(|(name, _)| name == "start")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| ImportError::parse(format!("feed link '{link}' has no start parameter")))?;
    start
        .parse()
        .map_err(|e| ImportError::parse(format!("invalid start '{start}' in '{link}': {e}")))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an Atom feed of items.
pub fn parse_feed(body: &str) -> Result<FeedPage> {
    parse_with(body, parse_entry)
}

/// Parse an Atom feed of tags into the tag names.
pub fn parse_tag_feed(body: &str) -> Result<Feed<String>> {
    parse_with(body, |entry| {
        Ok(child_elements(entry)
            .find(|child| child.value().name() == "title")
            .map(text_of)
            .unwrap_or_default())
    })
}

fn parse_with<T>(body: &str, parse_entry: impl Fn(ElementRef<'_>) -> Result<T>) -> Result<Feed<T>> {
    let doc = Html::parse_document(body);
    let feed_sel = Selector::parse("feed").unwrap();
    let feed = doc
        .select(&feed_sel)
        .next()
        .ok_or_else(|| ImportError::parse("document has no <feed> element"))?;

    let mut page = Feed::default();
    for child in child_elements(feed) {
        match child.value().name() {
            "link" => {
                let href = child.value().attr("href").map(String::from);
                match child.value().attr("rel") {
                    Some("self") => page.links.self_link = href,
                    Some("next") => page.links.next = href,
                    Some("last") => page.links.last = href,
                    _ => {}
                }
            }
            "entry" => page.entries.push(parse_entry(child)?),
            _ => {}
        }
    }

    Ok(page)
}

fn parse_entry(entry: ElementRef<'_>) -> Result<RemoteItem> {
    let mut item = RemoteItem::default();

    for child in child_elements(entry) {
        match child.value().name() {
            "title" => item.title = text_of(child),
            "zapi:key" => item.key = text_of(child),
            "zapi:itemtype" => item.item_type = text_of(child),
            "zapi:numtags" => item.num_tags = count_of(child)?,
            "zapi:numchildren" => item.num_children = count_of(child)?,
            "content" => item.content = ItemContent::new(child.inner_html()),
            _ => {}
        }
    }

    if item.key.is_empty() {
        return Err(ImportError::parse(format!(
            "feed entry '{}' has no zapi:key",
            item.title
        )));
    }

    Ok(item)
}

fn child_elements(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn count_of(el: ElementRef<'_>) -> Result<u32> {
    let text = text_of(el);
    text.parse().map_err(|e| {
        ImportError::parse(format!("invalid <{}> value '{text}': {e}", el.value().name()))
    })
}
