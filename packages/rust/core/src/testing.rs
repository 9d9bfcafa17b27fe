//! In-memory remote library and item builders for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use zoteroimport_shared::{ImportConfig, ImportError, LibraryRef, Result};
use zoteroimport_zotero::{
    FeedLinks, FeedPage, ITEM_TYPE_ATTACHMENT, ITEM_TYPE_NOTE, ItemContent, RemoteItem,
    RemoteLibrary, XHTML_NS,
};

pub(crate) fn test_config() -> ImportConfig {
    ImportConfig {
        collection_id: 7,
        public: true,
        ignore_invalid_files: true,
        resume: false,
    }
}

fn table_markup(rows: &str) -> String {
    format!(r#"<div xmlns="{XHTML_NS}"><table>{rows}</table></div>"#)
}

/// A regular item whose content table holds `(class, header, body)` rows.
pub(crate) fn book_item(key: &str, title: &str, rows: &[(&str, &str, &str)]) -> RemoteItem {
    let rows: String = rows
        .iter()
        .map(|(class, header, body)| {
            format!(r#"<tr class="{class}"><th>{header}</th><td>{body}</td></tr>"#)
        })
        .collect();
    RemoteItem {
        key: key.into(),
        item_type: "book".into(),
        title: title.into(),
        num_tags: 0,
        num_children: 0,
        content: ItemContent::new(table_markup(&rows)),
    }
}

pub(crate) fn note_item(key: &str, text: &str) -> RemoteItem {
    RemoteItem {
        key: key.into(),
        item_type: ITEM_TYPE_NOTE.into(),
        title: text.into(),
        num_tags: 0,
        num_children: 0,
        content: ItemContent::new(table_markup(&format!(
            r#"<tr class="note"><th>Note</th><td><p>{text}</p></td></tr>"#
        ))),
    }
}

pub(crate) fn attachment_item(key: &str, title: &str, url: Option<&str>) -> RemoteItem {
    let rows = url
        .map(|url| format!(r#"<tr class="url"><th>URL</th><td>{url}</td></tr>"#))
        .unwrap_or_default();
    RemoteItem {
        key: key.into(),
        item_type: ITEM_TYPE_ATTACHMENT.into(),
        title: title.into(),
        num_tags: 0,
        num_children: 0,
        content: ItemContent::new(table_markup(&rows)),
    }
}

fn page_link(start: u64) -> String {
    format!("https://api.zotero.org/users/1/items/top?format=atom&start={start}")
}

/// A page at offset `start` whose "last" link points at offset `last`.
pub(crate) fn feed_page(
    start: u64,
    next: Option<u64>,
    last: u64,
    entries: Vec<RemoteItem>,
) -> FeedPage {
    FeedPage {
        links: FeedLinks {
            self_link: Some(page_link(start)),
            next: next.map(page_link),
            last: Some(page_link(last)),
        },
        entries,
    }
}

/// Remote library serving canned responses and recording every call.
#[derive(Default)]
pub(crate) struct FakeRemote {
    pages: HashMap<u64, FeedPage>,
    tags: HashMap<String, Vec<String>>,
    children: HashMap<String, Vec<RemoteItem>>,
    files: HashMap<String, String>,
    fail_children: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub(crate) fn with_page(mut self, start: u64, page: FeedPage) -> Self {
        self.pages.insert(start, page);
        self
    }

    pub(crate) fn with_tags(mut self, key: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(key.into(), tags.iter().map(|t| (*t).to_string()).collect());
        self
    }

    pub(crate) fn with_children(mut self, key: &str, children: Vec<RemoteItem>) -> Self {
        self.children.insert(key.into(), children);
        self
    }

    pub(crate) fn with_file(mut self, key: &str, location: &str) -> Self {
        self.files.insert(key.into(), location.into());
        self
    }

    pub(crate) fn failing_children(mut self) -> Self {
        self.fail_children = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn page_requests(&self) -> usize {
        self.count("items_top")
    }

    pub(crate) fn file_requests(&self) -> usize {
        self.count("item_file")
    }

    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(call))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteLibrary for FakeRemote {
    async fn items_top(&self, _library: &LibraryRef, start: u64) -> Result<FeedPage> {
        self.record(format!("items_top {start}"));
        self.pages
            .get(&start)
            .cloned()
            .ok_or_else(|| ImportError::RemoteFetch(format!("no page at start {start}")))
    }

    async fn item_tags(&self, _library: &LibraryRef, key: &str) -> Result<Vec<String>> {
        self.record(format!("item_tags {key}"));
        Ok(self.tags.get(key).cloned().unwrap_or_default())
    }

    async fn item_children(&self, _library: &LibraryRef, key: &str) -> Result<Vec<RemoteItem>> {
        self.record(format!("item_children {key}"));
        if self.fail_children {
            return Err(ImportError::RemoteFetch(format!("children of {key}: 500")));
        }
        Ok(self.children.get(key).cloned().unwrap_or_default())
    }

    async fn item_file(&self, _library: &LibraryRef, key: &str) -> Result<Option<String>> {
        self.record(format!("item_file {key}"));
        Ok(self.files.get(key).cloned())
    }
}
