//! Shared types, error model, and configuration for zoteroimport.
//!
//! This crate is the foundation depended on by all other zoteroimport crates.
//! It provides:
//! - [`ImportError`]: the unified error type
//! - Domain types ([`LibraryRef`], [`ItemPayload`], [`ElementSet`])
//! - Configuration ([`AppConfig`], [`ImportConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DestinationConfig, ImportConfig, ZoteroConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ImportError, Result};
pub use types::{
    ElementSet, ElementText, ElementTexts, FileMetadata, FileSource, FileTransferType,
    ItemMetadata, ItemPayload, LibraryRef, LibraryType,
};
