//! Converts one remote item into a destination item payload.
//!
//! Translation may call the remote library for tags, child items and
//! attachment file locations. Any failed call aborts the item.

use tracing::{debug, instrument};
use zoteroimport_shared::{ElementSet, ImportConfig, ItemPayload, LibraryRef, Result};
use zoteroimport_zotero::{
    ContentQuery, ITEM_TYPE_ATTACHMENT, ITEM_TYPE_NOTE, RemoteItem, RemoteLibrary,
};

use crate::mapper::map_field;
use crate::mapping::FieldMappingTable;

/// Dublin Core element receiving the entry title.
pub const DC_TITLE: &str = "Title";
/// Dublin Core element receiving attachment links.
pub const DC_IDENTIFIER: &str = "Identifier";
/// Zotero element receiving child notes.
pub const ZOTERO_NOTE: &str = "Note";

/// Translates remote items of one library into payloads for one collection.
pub struct ItemTranslator<'a> {
    remote: &'a dyn RemoteLibrary,
    table: &'a FieldMappingTable,
    library: &'a LibraryRef,
    config: &'a ImportConfig,
}

impl<'a> ItemTranslator<'a> {
    pub fn new(
        remote: &'a dyn RemoteLibrary,
        table: &'a FieldMappingTable,
        library: &'a LibraryRef,
        config: &'a ImportConfig,
    ) -> Self {
        Self {
            remote,
            table,
            library,
            config,
        }
    }

    /// Build the payload for `item`.
    #[instrument(skip_all, fields(key = %item.key, item_type = %item.item_type))]
    pub async fn translate(&self, item: &RemoteItem) -> Result<ItemPayload> {
        let mut payload =
            ItemPayload::new(&item.key, self.config.collection_id, self.config.public);
        payload.file_metadata.ignore_invalid_files = self.config.ignore_invalid_files;

        payload.push_text(ElementSet::DublinCore, DC_TITLE, item.title.as_str());

        if item.is_attachment() {
            self.map_attachment(item, &mut payload).await?;
        }

        for node in item.field_nodes() {
            map_field(self.table, &node, &mut payload);
        }

        if item.num_tags > 0 {
            let tags = self.remote.item_tags(self.library, &item.key).await?;
            if !tags.is_empty() {
                payload.metadata.tags = Some(join_tags(&tags));
            }
        }

        if item.num_children > 0 {
            let children = self.remote.item_children(self.library, &item.key).await?;
            for child in &children {
                match child.item_type.as_str() {
                    ITEM_TYPE_NOTE => {
                        if let Some(note) = child.content.first_text(&ContentQuery::NOTE) {
                            payload.push_text(ElementSet::Zotero, ZOTERO_NOTE, note);
                        }
                    }
                    ITEM_TYPE_ATTACHMENT => self.map_attachment(child, &mut payload).await?,
                    other => debug!(child = %child.key, item_type = other, "ignoring child item"),
                }
            }
        }

        debug!(
            texts = payload.text_count(),
            files = payload.file_metadata.files.len(),
            "item translated"
        );
        Ok(payload)
    }

    /// Record an attachment's link and queue its file, if it has one.
    async fn map_attachment(&self, attachment: &RemoteItem, payload: &mut ItemPayload) -> Result<()> {
        if let Some(url) = attachment.content.first_text(&ContentQuery::URL) {
            payload.push_text(ElementSet::DublinCore, DC_IDENTIFIER, url);
        }

        if let Some(location) = self.remote.item_file(self.library, &attachment.key).await? {
            payload.push_file(location, attachment.title.as_str());
        }
        Ok(())
    }
}

/// Join tag names into the destination's comma-separated list. Commas inside
/// a tag become spaces so the tag survives the split.
pub fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| tag.replace(',', " "))
        .collect::<Vec<_>>()
        .join(",")
}
