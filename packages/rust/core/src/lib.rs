//! Import orchestration and domain logic for zoteroimport.
//!
//! This crate turns remote library items into destination payloads and
//! drives the paginated import (`Importer::run`).

pub mod import;
pub mod mapper;
pub mod mapping;
pub mod sink;
pub mod translator;

#[cfg(test)]
pub(crate) mod testing;

pub use import::{ImportJob, ImportProgress, ImportSummary, Importer, SilentProgress};
pub use mapper::map_field;
pub use mapping::{FieldMapping, FieldMappingTable, ZoteroTarget};
pub use sink::{CursorStore, ItemHandle, ItemSink, RunState};
pub use translator::{ItemTranslator, join_tags};
