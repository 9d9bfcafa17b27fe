//! Field mapping table: remote field name → destination elements.
//!
//! The table is built once (built-in or from a TOML file), validated, and then
//! shared read-only by every translation. TOML format:
//!
//! ```toml
//! [fields.abstractNote]
//! dublin_core = "Description"
//! zotero = "Abstract"
//!
//! [fields.creator]
//! dublin_core = "Creator"
//! zotero = ["Contributor", "Author", "Editor"]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use zoteroimport_shared::{ImportError, Result};

/// Remote field name of creator rows; their header cell carries the role.
pub const CREATOR_FIELD: &str = "creator";

/// Zotero-set target of a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ZoteroTarget {
    /// A single element name.
    Element(String),
    /// Role-specific element names; the first is the fallback.
    Roles(Vec<String>),
}

impl ZoteroTarget {
    /// Element used when no role-specific element applies.
    pub fn primary(&self) -> &str {
        match self {
            Self::Element(name) => name,
            Self::Roles(roles) => roles.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Whether `role` is one of the role-specific element names.
    pub fn allows(&self, role: &str) -> bool {
        match self {
            Self::Element(_) => false,
            Self::Roles(roles) => roles.iter().any(|r| r == role),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            Self::Element(name) => !name.trim().is_empty(),
            Self::Roles(roles) => {
                !roles.is_empty() && roles.iter().all(|r| !r.trim().is_empty())
            }
        }
    }
}

/// Destination elements for one remote field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub dublin_core: Option<String>,
    #[serde(default)]
    pub zotero: Option<ZoteroTarget>,
}

#[derive(Deserialize)]
struct MappingFile {
    fields: HashMap<String, FieldMapping>,
}

/// Immutable lookup table from remote field name to [`FieldMapping`].
#[derive(Debug, Clone)]
pub struct FieldMappingTable {
    fields: HashMap<String, FieldMapping>,
}

impl FieldMappingTable {
    /// Build a table, rejecting entries that map to no destination element.
    pub fn new(fields: HashMap<String, FieldMapping>) -> Result<Self> {
        for (name, mapping) in &fields {
            let unmapped = mapping.dublin_core.is_none() && mapping.zotero.is_none();
            let blank_dc = mapping
                .dublin_core
                .as_deref()
                .is_some_and(|dc| dc.trim().is_empty());
            let bad_zotero = mapping.zotero.as_ref().is_some_and(|z| !z.is_valid());

            if unmapped || blank_dc || bad_zotero {
                return Err(ImportError::validation(format!(
                    "field mapping '{name}' must name at least one non-empty destination element"
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Parse a TOML mapping table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: MappingFile = toml::from_str(content)
            .map_err(|e| ImportError::config(format!("invalid field mapping table: {e}")))?;
        Self::new(file.fields)
    }

    /// Load a TOML mapping table from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ImportError::io(path, e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ImportError::Config { message } => {
                ImportError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// The configured table if a path is given, otherwise the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let table = Self::from_file(path)?;
                tracing::info!(path = %path.display(), fields = table.len(), "loaded field mapping table");
                Ok(table)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldMapping> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The built-in Zotero → Dublin Core / Zotero element set table.
    pub fn builtin() -> Self {
        let mut fields: HashMap<String, FieldMapping> = BUILTIN_FIELDS
            .iter()
            .map(|(name, dc, zotero)| {
                (
                    (*name).to_string(),
                    FieldMapping {
                        dublin_core: dc.map(String::from),
                        zotero: zotero.map(|z| ZoteroTarget::Element(z.to_string())),
                    },
                )
            })
            .collect();

        fields.insert(
            CREATOR_FIELD.to_string(),
            FieldMapping {
                dublin_core: Some("Creator".into()),
                zotero: Some(ZoteroTarget::Roles(
                    CREATOR_ROLES.iter().map(|r| (*r).to_string()).collect(),
                )),
            },
        );

        Self { fields }
    }
}

/// Creator roles as rendered in the header cell. The first is the fallback
/// for roles not listed here.
const CREATOR_ROLES: &[&str] = &[
    "Contributor",
    "Author",
    "Editor",
    "Translator",
    "Series Editor",
    "Book Author",
    "Reviewed Author",
    "Interviewee",
    "Interviewer",
    "Director",
    "Scriptwriter",
    "Producer",
    "Cast Member",
    "Sponsor",
    "Cosponsor",
    "Counsel",
    "Inventor",
    "Attorney/Agent",
    "Recipient",
    "Performer",
    "Composer",
    "Words By",
    "Cartographer",
    "Programmer",
    "Artist",
    "Commenter",
    "Presenter",
    "Guest",
    "Podcaster",
];

/// (remote field, Dublin Core element, Zotero element)
///
/// `title` has no Dublin Core target: the entry title is recorded there already.
/// `url` likewise stays out of `Identifier`, which attachments fill.
const BUILTIN_FIELDS: &[(&str, Option<&str>, Option<&str>)] = &[
    ("itemType", Some("Type"), Some("Item Type")),
    ("title", None, Some("Title")),
    ("abstractNote", Some("Description"), Some("Abstract")),
    ("publicationTitle", Some("Source"), Some("Publication")),
    ("bookTitle", Some("Source"), Some("Book Title")),
    ("websiteTitle", Some("Source"), Some("Website Title")),
    ("blogTitle", Some("Source"), Some("Blog Title")),
    ("proceedingsTitle", Some("Source"), Some("Proceedings Title")),
    ("conferenceName", None, Some("Conference Name")),
    ("volume", None, Some("Volume")),
    ("issue", None, Some("Issue")),
    ("pages", None, Some("Pages")),
    ("numPages", None, Some("# of Pages")),
    ("numberOfVolumes", None, Some("# of Volumes")),
    ("edition", None, Some("Edition")),
    ("section", None, Some("Section")),
    ("series", Some("Relation"), Some("Series")),
    ("seriesTitle", None, Some("Series Title")),
    ("seriesText", None, Some("Series Text")),
    ("journalAbbreviation", None, Some("Journal Abbr")),
    ("shortTitle", None, Some("Short Title")),
    ("date", Some("Date"), Some("Date")),
    ("accessDate", None, Some("Accessed")),
    ("dateAdded", None, Some("Date Added")),
    ("dateModified", None, Some("Modified")),
    ("language", Some("Language"), Some("Language")),
    ("DOI", Some("Identifier"), Some("DOI")),
    ("ISBN", Some("Identifier"), Some("ISBN")),
    ("ISSN", Some("Identifier"), Some("ISSN")),
    ("url", None, Some("URL")),
    ("archive", None, Some("Archive")),
    ("archiveLocation", None, Some("Loc. in Archive")),
    ("libraryCatalog", None, Some("Library Catalog")),
    ("callNumber", None, Some("Call Number")),
    ("rights", Some("Rights"), Some("Rights")),
    ("extra", None, Some("Extra")),
    ("publisher", Some("Publisher"), Some("Publisher")),
    ("place", None, Some("Place")),
    ("university", Some("Publisher"), Some("University")),
    ("institution", Some("Publisher"), Some("Institution")),
    ("thesisType", None, Some("Type")),
    ("reportNumber", None, Some("Report Number")),
    ("reportType", None, Some("Report Type")),
    ("websiteType", None, Some("Website Type")),
    ("medium", Some("Format"), Some("Medium")),
    ("runningTime", None, Some("Running Time")),
    ("system", None, Some("System")),
    ("subject", Some("Subject"), Some("Subject")),
];
