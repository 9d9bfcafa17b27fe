//! libSQL-backed destination repository.
//!
//! The [`Storage`] struct wraps a libSQL database holding imported items, their
//! element texts, tags and queued files, plus the import run ledger used to
//! resume an interrupted import.
//!
//! **Access rules:**
//! - Import runs: read-write (sole writer) via [`Storage::open`]
//! - Reporting (`runs` command): read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;
use zoteroimport_shared::{
    ElementSet, FileSource, ImportError, ItemPayload, LibraryRef, Result,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// An item as recorded in the repository.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub id: i64,
    pub collection_id: i64,
    pub public: bool,
    pub source_key: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub element_texts: Vec<StoredElementText>,
    pub files: Vec<FileSource>,
}

impl StoredItem {
    /// Texts of one element, in position order.
    pub fn texts(&self, set: ElementSet, element: &str) -> Vec<&str> {
        self.element_texts
            .iter()
            .filter(|t| t.element_set == set && t.element == element)
            .map(|t| t.text.as_str())
            .collect()
    }
}

/// One stored element text row.
#[derive(Debug, Clone)]
pub struct StoredElementText {
    pub element_set: ElementSet,
    pub element: String,
    pub text: String,
    pub html: bool,
}

/// Progress ledger of one import of a library into a collection.
#[derive(Debug, Clone)]
pub struct ImportRun {
    pub id: String,
    pub library_type: String,
    pub library_id: String,
    pub collection_id: i64,
    /// Offset of the first page not yet fully imported.
    pub next_start: u64,
    pub items_imported: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn storage_err(e: libsql::Error) -> ImportError {
    ImportError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ImportError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        conn.execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImportError::Storage(format!(
                "no database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ImportError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ImportError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Item operations
    // -----------------------------------------------------------------------

    /// Insert a translated item with its texts, tags and files in one
    /// transaction. Returns the new item ID.
    pub async fn insert_item(&self, payload: &ItemPayload) -> Result<i64> {
        self.check_writable()?;

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        match write_item(&tx, payload).await {
            Ok(id) => {
                tx.commit().await.map_err(storage_err)?;
                Ok(id)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Get an item with all its related rows.
    pub async fn get_item(&self, id: i64) -> Result<Option<StoredItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, collection_id, public, source_key, created_at FROM items WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };

        let mut item = StoredItem {
            id: row.get::<i64>(0).map_err(storage_err)?,
            collection_id: row.get::<i64>(1).map_err(storage_err)?,
            public: row.get::<i64>(2).map_err(storage_err)? != 0,
            source_key: row.get::<String>(3).map_err(storage_err)?,
            created_at: parse_timestamp(&row.get::<String>(4).map_err(storage_err)?)?,
            tags: Vec::new(),
            element_texts: Vec::new(),
            files: Vec::new(),
        };

        item.tags = self.item_tags(id).await?;
        item.element_texts = self.item_element_texts(id).await?;
        item.files = self.item_files(id).await?;
        Ok(Some(item))
    }

    /// List all items filed in a collection, in insertion order.
    pub async fn list_items(&self, collection_id: i64) -> Result<Vec<StoredItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM items WHERE collection_id = ?1 ORDER BY id",
                params![collection_id],
            )
            .await
            .map_err(storage_err)?;

        let mut ids = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            ids.push(row.get::<i64>(0).map_err(storage_err)?);
        }

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.get_item(id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Number of items filed in a collection.
    pub async fn count_items(&self, collection_id: i64) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM items WHERE collection_id = ?1",
                params![collection_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(storage_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn item_tags(&self, item_id: i64) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tag FROM item_tags WHERE item_id = ?1 ORDER BY rowid",
                params![item_id],
            )
            .await
            .map_err(storage_err)?;

        let mut tags = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tags.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(tags)
    }

    async fn item_element_texts(&self, item_id: i64) -> Result<Vec<StoredElementText>> {
        let mut rows = self
            .conn
            .query(
                "SELECT element_set, element, text, html FROM element_texts
                 WHERE item_id = ?1 ORDER BY element_set, element, position",
                params![item_id],
            )
            .await
            .map_err(storage_err)?;

        let mut texts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            texts.push(StoredElementText {
                element_set: row.get::<String>(0).map_err(storage_err)?.parse()?,
                element: row.get::<String>(1).map_err(storage_err)?,
                text: row.get::<String>(2).map_err(storage_err)?,
                html: row.get::<i64>(3).map_err(storage_err)? != 0,
            });
        }
        Ok(texts)
    }

    async fn item_files(&self, item_id: i64) -> Result<Vec<FileSource>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, name FROM files WHERE item_id = ?1 ORDER BY position",
                params![item_id],
            )
            .await
            .map_err(storage_err)?;

        let mut files = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            files.push(FileSource {
                source: row.get::<String>(0).map_err(storage_err)?,
                name: row.get::<String>(1).map_err(storage_err)?,
            });
        }
        Ok(files)
    }

    // -----------------------------------------------------------------------
    // Import run operations
    // -----------------------------------------------------------------------

    /// Insert a new import run starting at offset 0.
    pub async fn insert_run(&self, library: &LibraryRef, collection_id: i64) -> Result<ImportRun> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO import_runs (id, library_type, library_id, collection_id, started_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    library.library_type.as_str(),
                    library.library_id.as_str(),
                    collection_id,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;

        Ok(ImportRun {
            id,
            library_type: library.library_type.to_string(),
            library_id: library.library_id.clone(),
            collection_id,
            next_start: 0,
            items_imported: 0,
            started_at: now,
            updated_at: now,
            finished_at: None,
        })
    }

    /// The most recent unfinished run for a library and collection.
    pub async fn find_unfinished_run(
        &self,
        library: &LibraryRef,
        collection_id: i64,
    ) -> Result<Option<ImportRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, library_type, library_id, collection_id, next_start, items_imported,
                        started_at, updated_at, finished_at
                 FROM import_runs
                 WHERE library_type = ?1 AND library_id = ?2 AND collection_id = ?3
                   AND finished_at IS NULL
                 ORDER BY started_at DESC LIMIT 1",
                params![
                    library.library_type.as_str(),
                    library.library_id.as_str(),
                    collection_id
                ],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_import_run(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Record that every page before `next_start` has been imported.
    pub async fn update_run_progress(
        &self,
        run_id: &str,
        next_start: u64,
        items_imported: u64,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE import_runs SET next_start = ?1, items_imported = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![next_start as i64, items_imported as i64, now.as_str(), run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Mark a run as completed.
    pub async fn finish_run(&self, run_id: &str, items_imported: u64) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE import_runs SET finished_at = ?1, updated_at = ?1, items_imported = ?2
                 WHERE id = ?3",
                params![now.as_str(), items_imported as i64, run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All import runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<ImportRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, library_type, library_id, collection_id, next_start, items_imported,
                        started_at, updated_at, finished_at
                 FROM import_runs ORDER BY started_at DESC",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut runs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            runs.push(row_to_import_run(&row)?);
        }
        Ok(runs)
    }
}

/// Write one item and its child rows on `conn` (an open transaction).
async fn write_item(conn: &Connection, payload: &ItemPayload) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO items (collection_id, public, source_key, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            payload.metadata.collection_id,
            i64::from(payload.metadata.public),
            payload.source_key.as_str(),
            now.as_str(),
        ],
    )
    .await
    .map_err(storage_err)?;
    let item_id = conn.last_insert_rowid();

    for (set, elements) in &payload.element_texts {
        for (element, texts) in elements {
            for (position, text) in texts.iter().enumerate() {
                conn.execute(
                    "INSERT INTO element_texts (item_id, element_set, element, position, text, html)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        item_id,
                        set.name(),
                        element.as_str(),
                        position as i64,
                        text.text.as_str(),
                        i64::from(text.html),
                    ],
                )
                .await
                .map_err(storage_err)?;
            }
        }
    }

    // The tag string is comma-delimited; blank names are dropped.
    if let Some(tags) = &payload.metadata.tags {
        for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            conn.execute(
                "INSERT OR IGNORE INTO item_tags (item_id, tag) VALUES (?1, ?2)",
                params![item_id, tag],
            )
            .await
            .map_err(storage_err)?;
        }
    }

    let files = &payload.file_metadata;
    for (position, file) in files.files.iter().enumerate() {
        conn.execute(
            "INSERT INTO files (item_id, position, source, name, transfer_type, ignore_invalid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item_id,
                position as i64,
                file.source.as_str(),
                file.name.as_str(),
                files.transfer_type.as_str(),
                i64::from(files.ignore_invalid_files),
            ],
        )
        .await
        .map_err(storage_err)?;
    }

    Ok(item_id)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ImportError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to an [`ImportRun`].
fn row_to_import_run(row: &libsql::Row) -> Result<ImportRun> {
    Ok(ImportRun {
        id: row.get::<String>(0).map_err(storage_err)?,
        library_type: row.get::<String>(1).map_err(storage_err)?,
        library_id: row.get::<String>(2).map_err(storage_err)?,
        collection_id: row.get::<i64>(3).map_err(storage_err)?,
        next_start: row.get::<i64>(4).map_err(storage_err)? as u64,
        items_imported: row.get::<i64>(5).map_err(storage_err)? as u64,
        started_at: parse_timestamp(&row.get::<String>(6).map_err(storage_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(7).map_err(storage_err)?)?,
        finished_at: match row.get::<String>(8) {
            Ok(s) => Some(parse_timestamp(&s)?),
            Err(_) => None,
        },
    })
}
