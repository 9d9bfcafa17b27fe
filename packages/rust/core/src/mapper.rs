//! Copies one remote metadata row into an item payload.

use tracing::trace;
use zoteroimport_shared::{ElementSet, ItemPayload};
use zoteroimport_zotero::FieldNode;

use crate::mapping::{CREATOR_FIELD, FieldMappingTable};

/// Map `node` through `table` into `payload`.
///
/// Rows whose field has no mapping are dropped. Creator rows are filed under
/// their role (the header cell) when the mapping lists that role, otherwise
/// under the mapping's primary element.
pub fn map_field(table: &FieldMappingTable, node: &FieldNode, payload: &mut ItemPayload) {
    let Some(mapping) = table.get(&node.class) else {
        trace!(field = %node.class, "no mapping, row dropped");
        return;
    };

    if let Some(element) = mapping.dublin_core.as_deref() {
        payload.push_text(ElementSet::DublinCore, element, node.body.as_str());
    }

    if let Some(target) = &mapping.zotero {
        let element = if node.class == CREATOR_FIELD && target.allows(&node.header) {
            node.header.as_str()
        } else {
            target.primary()
        };
        payload.push_text(ElementSet::Zotero, element, node.body.as_str());
    }
}
