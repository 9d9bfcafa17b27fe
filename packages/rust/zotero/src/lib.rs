//! Zotero Web API access: Atom feed parsing, content queries, and the
//! remote library client.
//!
//! This crate provides:
//! - [`RemoteLibrary`]: the calls the importer makes against a library
//! - [`ZoteroClient`]: reqwest-backed implementation of [`RemoteLibrary`]
//! - [`feed`]: Atom feed pages and their navigation links
//! - [`content`]: structured queries over an entry's XHTML content

pub mod client;
pub mod content;
pub mod feed;

use async_trait::async_trait;
use zoteroimport_shared::{LibraryRef, Result};

pub use client::{ClientOptions, ZoteroClient};
pub use content::{ContentQuery, FieldNode, ItemContent, XHTML_NS};
pub use feed::{
    Feed, FeedLinks, FeedPage, ITEM_TYPE_ATTACHMENT, ITEM_TYPE_NOTE, RemoteItem, parse_feed,
    parse_tag_feed, start_param,
};

/// Calls made against one remote library during an import.
///
/// Every call is independent; implementations only hold credentials.
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// One page of the library's top-level items, starting at offset `start`.
    async fn items_top(&self, library: &LibraryRef, start: u64) -> Result<FeedPage>;

    /// Tag names attached to an item.
    async fn item_tags(&self, library: &LibraryRef, key: &str) -> Result<Vec<String>>;

    /// Child items (notes, attachments) of an item.
    async fn item_children(&self, library: &LibraryRef, key: &str) -> Result<Vec<RemoteItem>>;

    /// Download location of an attachment's file, if it has one.
    async fn item_file(&self, library: &LibraryRef, key: &str) -> Result<Option<String>>;
}
