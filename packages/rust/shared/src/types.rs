//! Core domain types shared by the remote client, the translator and the
//! destination repository.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

// ---------------------------------------------------------------------------
// Library addressing
// ---------------------------------------------------------------------------

/// Owner kind of a remote library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    User,
    Group,
}

impl LibraryType {
    /// URL path segment the remote API uses for this library kind.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryType {
    type Err = ImportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(ImportError::validation(format!(
                "unknown library type '{other}': expected 'user' or 'group'"
            ))),
        }
    }
}

/// A user's or group's library in the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryRef {
    pub library_type: LibraryType,
    pub library_id: String,
}

impl LibraryRef {
    pub fn new(library_type: LibraryType, library_id: impl Into<String>) -> Self {
        Self {
            library_type,
            library_id: library_id.into(),
        }
    }

    /// Path prefix for every request scoped to this library, e.g. `/groups/42`.
    pub fn path_prefix(&self) -> String {
        format!("/{}/{}", self.library_type.path_segment(), self.library_id)
    }
}

impl fmt::Display for LibraryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library_type, self.library_id)
    }
}

// ---------------------------------------------------------------------------
// Destination payload
// ---------------------------------------------------------------------------

/// The two element vocabularies remote fields are translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementSet {
    #[serde(rename = "Dublin Core")]
    DublinCore,
    #[serde(rename = "Zotero")]
    Zotero,
}

impl ElementSet {
    pub fn name(self) -> &'static str {
        match self {
            Self::DublinCore => "Dublin Core",
            Self::Zotero => "Zotero",
        }
    }
}

impl fmt::Display for ElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementSet {
    type Err = ImportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Dublin Core" => Ok(Self::DublinCore),
            "Zotero" => Ok(Self::Zotero),
            other => Err(ImportError::validation(format!(
                "unknown element set '{other}'"
            ))),
        }
    }
}

/// One text value of a destination element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementText {
    pub text: String,
    /// Whether `text` is markup rather than plain text.
    pub html: bool,
}

impl ElementText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
        }
    }
}

/// Element set → element name → ordered values.
pub type ElementTexts = BTreeMap<ElementSet, BTreeMap<String, Vec<ElementText>>>;

/// Item-level metadata handed to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub collection_id: i64,
    pub public: bool,
    /// Comma-delimited tag list, absent when the remote item has no tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// How the destination obtains attached files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileTransferType {
    Url,
}

impl FileTransferType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "Url",
        }
    }
}

/// A file the destination should ingest for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    /// Location the file is transferred from.
    pub source: String,
    /// Display name (the attachment's title).
    pub name: String,
}

/// File ingestion instructions for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub transfer_type: FileTransferType,
    pub ignore_invalid_files: bool,
    pub files: Vec<FileSource>,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            transfer_type: FileTransferType::Url,
            ignore_invalid_files: true,
            files: Vec::new(),
        }
    }
}

/// Complete translated representation of one remote item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    /// Remote item key, kept for traceability.
    pub source_key: String,
    pub metadata: ItemMetadata,
    pub element_texts: ElementTexts,
    pub file_metadata: FileMetadata,
}

impl ItemPayload {
    pub fn new(source_key: impl Into<String>, collection_id: i64, public: bool) -> Self {
        Self {
            source_key: source_key.into(),
            metadata: ItemMetadata {
                collection_id,
                public,
                tags: None,
            },
            element_texts: ElementTexts::new(),
            file_metadata: FileMetadata::default(),
        }
    }

    /// Append a plain-text value to an element, keeping earlier values.
    pub fn push_text(&mut self, set: ElementSet, element: &str, text: impl Into<String>) {
        self.element_texts
            .entry(set)
            .or_default()
            .entry(element.to_string())
            .or_default()
            .push(ElementText::plain(text));
    }

    /// Values recorded for an element, in insertion order.
    pub fn texts(&self, set: ElementSet, element: &str) -> &[ElementText] {
        self.element_texts
            .get(&set)
            .and_then(|elements| elements.get(element))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn push_file(&mut self, source: impl Into<String>, name: impl Into<String>) {
        self.file_metadata.files.push(FileSource {
            source: source.into(),
            name: name.into(),
        });
    }

    /// Total number of element text values across both sets.
    pub fn text_count(&self) -> usize {
        self.element_texts
            .values()
            .flat_map(|elements| elements.values())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_type_parses_and_resolves_path() {
        let lib = LibraryRef::new("group".parse().unwrap(), "42");
        assert_eq!(lib.path_prefix(), "/groups/42");
        assert_eq!(lib.to_string(), "group:42");

        let user: LibraryType = "user".parse().unwrap();
        assert_eq!(user.path_segment(), "users");

        let err = "org".parse::<LibraryType>().unwrap_err();
        assert!(err.to_string().contains("unknown library type 'org'"));
    }

    #[test]
    fn payload_appends_in_order() {
        let mut payload = ItemPayload::new("ABCD1234", 7, true);
        payload.push_text(ElementSet::Zotero, "Author", "Smith");
        payload.push_text(ElementSet::Zotero, "Author", "Jones");
        payload.push_text(ElementSet::DublinCore, "Title", "X");

        let authors: Vec<_> = payload
            .texts(ElementSet::Zotero, "Author")
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(authors, ["Smith", "Jones"]);
        assert!(payload.texts(ElementSet::Zotero, "Editor").is_empty());
        assert_eq!(payload.text_count(), 3);
    }

    #[test]
    fn file_metadata_defaults_to_url_transfer() {
        let payload = ItemPayload::new("K", 1, true);
        assert_eq!(payload.file_metadata.transfer_type, FileTransferType::Url);
        assert!(payload.file_metadata.ignore_invalid_files);
        assert!(payload.file_metadata.files.is_empty());
    }

    #[test]
    fn payload_serializes_element_set_names() {
        let mut payload = ItemPayload::new("K", 1, false);
        payload.push_text(ElementSet::DublinCore, "Title", "X");
        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(json.contains("\"Dublin Core\""));
        assert!(!json.contains("\"tags\""));
    }
}
