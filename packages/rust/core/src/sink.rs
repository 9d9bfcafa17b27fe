//! Destination seams: where payloads go and where import progress is kept.

use async_trait::async_trait;
use tracing::{debug, info, trace};
use zoteroimport_shared::{ImportError, ItemPayload, LibraryRef, Result};
use zoteroimport_storage::Storage;

// ---------------------------------------------------------------------------
// ItemSink
// ---------------------------------------------------------------------------

/// Reference to an item created in the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    pub id: i64,
    pub source_key: String,
}

/// Destination repository accepting translated items.
#[async_trait]
pub trait ItemSink: Send + Sync {
    /// Create an item from `payload`.
    async fn submit(&self, payload: &ItemPayload) -> Result<ItemHandle>;

    /// Release whatever the destination holds for a created item.
    fn release(&self, handle: ItemHandle) {
        drop(handle);
    }
}

#[async_trait]
impl ItemSink for Storage {
    async fn submit(&self, payload: &ItemPayload) -> Result<ItemHandle> {
        let id = self.insert_item(payload).await.map_err(|e| {
            ImportError::SinkSubmission(format!("item {}: {e}", payload.source_key))
        })?;
        Ok(ItemHandle {
            id,
            source_key: payload.source_key.clone(),
        })
    }

    fn release(&self, handle: ItemHandle) {
        trace!(id = handle.id, key = %handle.source_key, "item released");
    }
}

// ---------------------------------------------------------------------------
// CursorStore
// ---------------------------------------------------------------------------

/// Progress of one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub run_id: String,
    /// Offset of the first page still to import.
    pub start: u64,
    /// Items imported by earlier sessions of this run.
    pub items_imported: u64,
    pub resumed: bool,
}

/// Persists the pagination cursor so an interrupted import can resume.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Start a run, or continue the latest unfinished one when `resume` is set.
    async fn begin_run(
        &self,
        library: &LibraryRef,
        collection_id: i64,
        resume: bool,
    ) -> Result<RunState>;

    /// Record that every page before `next_start` is imported.
    async fn record_page(&self, run: &RunState, next_start: u64, items_imported: u64)
    -> Result<()>;

    async fn finish_run(&self, run: &RunState, items_imported: u64) -> Result<()>;
}

#[async_trait]
impl CursorStore for Storage {
    async fn begin_run(
        &self,
        library: &LibraryRef,
        collection_id: i64,
        resume: bool,
    ) -> Result<RunState> {
        if resume {
            if let Some(run) = self.find_unfinished_run(library, collection_id).await? {
                info!(
                    run = %run.id,
                    next_start = run.next_start,
                    items_imported = run.items_imported,
                    "resuming import run"
                );
                return Ok(RunState {
                    run_id: run.id,
                    start: run.next_start,
                    items_imported: run.items_imported,
                    resumed: true,
                });
            }
            info!(%library, collection_id, "no unfinished run, starting from the first page");
        }

        let run = self.insert_run(library, collection_id).await?;
        debug!(run = %run.id, "import run started");
        Ok(RunState {
            run_id: run.id,
            start: 0,
            items_imported: 0,
            resumed: false,
        })
    }

    async fn record_page(
        &self,
        run: &RunState,
        next_start: u64,
        items_imported: u64,
    ) -> Result<()> {
        self.update_run_progress(&run.run_id, next_start, items_imported)
            .await
    }

    async fn finish_run(&self, run: &RunState, items_imported: u64) -> Result<()> {
        Storage::finish_run(self, &run.run_id, items_imported).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use zoteroimport_shared::{ElementSet, LibraryType};

    async fn temp_storage() -> (Storage, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("zi_sink_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&path).await.unwrap();
        (storage, path)
    }

    #[tokio::test]
    async fn storage_sink_submits_payload() {
        let (storage, path) = temp_storage().await;
        let mut payload = ItemPayload::new("ABCD2345", 3, false);
        payload.push_text(ElementSet::DublinCore, "Title", "X");
        payload.metadata.tags = Some("fiction drama".into());

        let handle = storage.submit(&payload).await.unwrap();
        assert_eq!(handle.source_key, "ABCD2345");

        let stored = storage.get_item(handle.id).await.unwrap().unwrap();
        assert_eq!(stored.texts(ElementSet::DublinCore, "Title"), ["X"]);
        assert_eq!(stored.tags, ["fiction drama"]);
        assert!(!stored.public);
        storage.release(handle);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn readonly_storage_rejects_submission() {
        let (storage, path) = temp_storage().await;
        drop(storage);
        let readonly = Storage::open_readonly(&path).await.unwrap();

        let err = readonly
            .submit(&ItemPayload::new("ABCD2345", 3, true))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::SinkSubmission(_)));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn cursor_resumes_unfinished_run() {
        let (storage, path) = temp_storage().await;
        let library = LibraryRef::new(LibraryType::Group, "42");

        let run = storage.begin_run(&library, 3, true).await.unwrap();
        assert!(!run.resumed);
        assert_eq!(run.start, 0);
        storage.record_page(&run, 50, 50).await.unwrap();

        let resumed = storage.begin_run(&library, 3, true).await.unwrap();
        assert!(resumed.resumed);
        assert_eq!(resumed.run_id, run.run_id);
        assert_eq!(resumed.start, 50);
        assert_eq!(resumed.items_imported, 50);

        let fresh = storage.begin_run(&library, 3, false).await.unwrap();
        assert_ne!(fresh.run_id, run.run_id);
        assert_eq!(fresh.start, 0);

        CursorStore::finish_run(&storage, &fresh, 0).await.unwrap();
        CursorStore::finish_run(&storage, &resumed, 75).await.unwrap();
        let after = storage.begin_run(&library, 3, true).await.unwrap();
        assert!(!after.resumed);

        let _ = std::fs::remove_file(&path);
    }
}
