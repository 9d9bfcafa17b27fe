//! Import orchestration: page through a library's top-level items, translate
//! each one and submit it to the destination.
//!
//! Pages are processed strictly in order. The first failure stops the import;
//! items already submitted stay in the destination, and with a cursor store
//! the run can be resumed from the first unfinished page.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use zoteroimport_shared::{ImportConfig, ImportError, LibraryRef, Result};
use zoteroimport_zotero::RemoteLibrary;

use crate::mapping::FieldMappingTable;
use crate::sink::{CursorStore, ItemSink, RunState};
use crate::translator::ItemTranslator;

/// One import: which library to read and how to file its items.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub library: LibraryRef,
    pub config: ImportConfig,
}

/// Outcome of a completed import.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// Items submitted by this session.
    pub items_imported: u64,
    /// Items submitted by this run, including resumed sessions.
    pub total_items: u64,
    pub pages_fetched: u64,
    /// Offset this session started from, when it continued an earlier run.
    pub resumed_from: Option<u64>,
    pub run_id: Option<String>,
    pub elapsed: Duration,
}

/// Progress callback for reporting import status.
pub trait ImportProgress: Send + Sync {
    /// Called after a page has been fetched.
    fn page_fetched(&self, start: u64, entries: usize);
    /// Called after an item has been submitted.
    fn item_imported(&self, key: &str, title: &str, total: u64);
    /// Called when the import completes.
    fn done(&self, summary: &ImportSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ImportProgress for SilentProgress {
    fn page_fetched(&self, _start: u64, _entries: usize) {}
    fn item_imported(&self, _key: &str, _title: &str, _total: u64) {}
    fn done(&self, _summary: &ImportSummary) {}
}

/// Drives the page loop for one remote library and one destination.
pub struct Importer<'a> {
    remote: &'a dyn RemoteLibrary,
    sink: &'a dyn ItemSink,
    table: &'a FieldMappingTable,
    cursor: Option<&'a dyn CursorStore>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Importer<'a> {
    pub fn new(
        remote: &'a dyn RemoteLibrary,
        sink: &'a dyn ItemSink,
        table: &'a FieldMappingTable,
    ) -> Self {
        Self {
            remote,
            sink,
            table,
            cursor: None,
            cancel: None,
        }
    }

    /// Persist the page cursor in `store`.
    pub fn with_cursor_store(mut self, store: &'a dyn CursorStore) -> Self {
        self.cursor = Some(store);
        self
    }

    /// Stop before the next page once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Import every top-level item of the job's library.
    #[instrument(skip_all, fields(library = %job.library, collection = job.config.collection_id))]
    pub async fn run(&self, job: &ImportJob, progress: &dyn ImportProgress) -> Result<ImportSummary> {
        let started = Instant::now();
        let translator = ItemTranslator::new(self.remote, self.table, &job.library, &job.config);

        let run: Option<RunState> = match self.cursor {
            Some(store) => Some(
                store
                    .begin_run(&job.library, job.config.collection_id, job.config.resume)
                    .await?,
            ),
            None => None,
        };

        let mut start = run.as_ref().map_or(0, |r| r.start);
        let previous = run.as_ref().map_or(0, |r| r.items_imported);
        let resumed_from = run.as_ref().filter(|r| r.resumed).map(|r| r.start);

        info!(start, resumed = resumed_from.is_some(), "starting import");

        let mut imported: u64 = 0;
        let mut pages: u64 = 0;

        loop {
            if self.cancelled() {
                warn!(start, imported, "import cancelled before next page");
                return Err(ImportError::Cancelled);
            }

            let page = self.remote.items_top(&job.library, start).await?;
            pages += 1;
            progress.page_fetched(start, page.entries.len());
            debug!(start, entries = page.entries.len(), "page fetched");

            for item in &page.entries {
                let payload = translator.translate(item).await?;
                let handle = self.sink.submit(&payload).await?;
                debug!(key = %item.key, id = handle.id, "item submitted");
                self.sink.release(handle);
                imported += 1;
                progress.item_imported(&item.key, &item.title, previous + imported);
            }

            if page.is_last() {
                break;
            }
            if page.links.last.is_none() {
                warn!(start, "page has no last link, treating it as the only page");
                break;
            }

            match page.next_start()? {
                Some(next) if next > start => start = next,
                Some(next) => {
                    warn!(start, next, "next page does not advance, stopping");
                    break;
                }
                None => {
                    warn!(start, "page is neither last nor linked to a next page, stopping");
                    break;
                }
            }

            if let (Some(store), Some(run)) = (self.cursor, run.as_ref()) {
                store.record_page(run, start, previous + imported).await?;
            }
        }

        if let (Some(store), Some(run)) = (self.cursor, run.as_ref()) {
            store.finish_run(run, previous + imported).await?;
        }

        let summary = ImportSummary {
            items_imported: imported,
            total_items: previous + imported,
            pages_fetched: pages,
            resumed_from,
            run_id: run.map(|r| r.run_id),
            elapsed: started.elapsed(),
        };

        info!(
            items = summary.items_imported,
            total = summary.total_items,
            pages = summary.pages_fetched,
            elapsed_ms = summary.elapsed.as_millis(),
            "import complete"
        );
        progress.done(&summary);
        Ok(summary)
    }
}
