//! Application configuration for zoteroimport.
//!
//! User config lives at `~/.zoteroimport/zoteroimport.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "zoteroimport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".zoteroimport";

// ---------------------------------------------------------------------------
// Config structs (matching zoteroimport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote API settings.
    #[serde(default)]
    pub zotero: ZoteroConfig,

    /// Destination repository settings.
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Optional TOML field mapping table replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<String>,
}

/// `[zotero]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoteroConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Entries per feed page; the server default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
}

impl Default for ZoteroConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            page_limit: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.zotero.org".into()
}
fn default_api_key_env() -> String {
    "ZOTERO_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[destination]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Path to the destination repository database.
    #[serde(default = "default_database")]
    pub database: String,

    /// Visibility of imported items.
    #[serde(default = "default_true")]
    pub public: bool,

    /// Whether the destination skips files it cannot ingest.
    #[serde(default = "default_true")]
    pub ignore_invalid_files: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            public: true,
            ignore_invalid_files: true,
        }
    }
}

fn default_database() -> String {
    "var/omeka.db".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Import config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for one import run, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Destination collection every item is filed under.
    pub collection_id: i64,
    /// Visibility of imported items.
    pub public: bool,
    /// Whether the destination skips files it cannot ingest.
    pub ignore_invalid_files: bool,
    /// Continue the last unfinished run for the same library and collection.
    pub resume: bool,
}

impl ImportConfig {
    pub fn new(config: &AppConfig, collection_id: i64) -> Self {
        Self {
            collection_id,
            public: config.destination.public,
            ignore_invalid_files: config.destination.ignore_invalid_files,
            resume: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.zoteroimport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ImportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.zoteroimport/zoteroimport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ImportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ImportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ImportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ImportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the Zotero API key from the configured env var.
///
/// Public libraries can be read without a key, so an unset variable is `None`;
/// a variable that is set but empty is rejected.
pub fn resolve_api_key(config: &AppConfig) -> Result<Option<String>> {
    let var_name = &config.zotero.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if val.trim().is_empty() => Err(ImportError::config(format!(
            "{var_name} is set but empty. Create a key at https://www.zotero.org/settings/keys"
        ))),
        Ok(val) => Ok(Some(val)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("api.zotero.org"));
        assert!(toml_str.contains("ZOTERO_API_KEY"));
        assert!(!toml_str.contains("mapping_file"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
mapping_file = "/etc/zoteroimport/fields.toml"

[zotero]
timeout_secs = 5
page_limit = 25

[destination]
public = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.zotero.timeout_secs, 5);
        assert_eq!(config.zotero.page_limit, Some(25));
        assert_eq!(config.zotero.base_url, "https://api.zotero.org");
        assert!(!config.destination.public);
        assert!(config.destination.ignore_invalid_files);
        assert_eq!(config.destination.database, "var/omeka.db");
        assert_eq!(
            config.mapping_file.as_deref(),
            Some("/etc/zoteroimport/fields.toml")
        );
    }

    #[test]
    fn import_config_from_app_config() {
        let mut app = AppConfig::default();
        app.destination.public = false;
        let import = ImportConfig::new(&app, 9);
        assert_eq!(import.collection_id, 9);
        assert!(!import.public);
        assert!(import.ignore_invalid_files);
        assert!(!import.resume);
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.zotero.api_key_env = "ZI_TEST_NONEXISTENT_KEY_12345".into();
        assert!(resolve_api_key(&config).unwrap().is_none());
    }
}
