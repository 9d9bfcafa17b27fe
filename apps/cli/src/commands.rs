//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use zoteroimport_core::{FieldMappingTable, ImportJob, ImportProgress, ImportSummary, Importer};
use zoteroimport_shared::{
    AppConfig, ImportConfig, LibraryRef, LibraryType, init_config, load_config, resolve_api_key,
};
use zoteroimport_storage::Storage;
use zoteroimport_zotero::{ClientOptions, ZoteroClient};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// zoteroimport: copy a Zotero library into a collection repository.
#[derive(Parser)]
#[command(
    name = "zoteroimport",
    version,
    about = "Import the top-level items of a Zotero library into a collection repository.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Kind of Zotero library.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LibraryKind {
    User,
    Group,
}

impl From<LibraryKind> for LibraryType {
    fn from(kind: LibraryKind) -> Self {
        match kind {
            LibraryKind::User => LibraryType::User,
            LibraryKind::Group => LibraryType::Group,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Import every top-level item of a library into a collection.
    Import {
        /// Zotero user or group ID.
        #[arg(long)]
        library_id: String,

        /// Whether the ID names a user or a group library.
        #[arg(long, value_enum, default_value = "user")]
        library_type: LibraryKind,

        /// Destination collection for every imported item.
        #[arg(long)]
        collection_id: i64,

        /// Continue the last unfinished import of this library and collection.
        #[arg(long)]
        resume: bool,

        /// Import items as private regardless of the configured default.
        #[arg(long)]
        private: bool,

        /// Destination database (overrides `destination.database`).
        #[arg(long)]
        database: Option<PathBuf>,

        /// Field mapping table (overrides `mapping_file`).
        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// List recorded import runs.
    Runs {
        /// Destination database (overrides `destination.database`).
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "zoteroimport=info",
        1 => "zoteroimport=debug",
        _ => "zoteroimport=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import {
            library_id,
            library_type,
            collection_id,
            resume,
            private,
            database,
            mapping,
        } => {
            let args = ImportArgs {
                library: LibraryRef::new(library_type.into(), library_id),
                collection_id,
                resume,
                private,
                database,
                mapping,
            };
            cmd_import(args).await
        }
        Command::Runs { database } => cmd_runs(database.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

struct ImportArgs {
    library: LibraryRef,
    collection_id: i64,
    resume: bool,
    private: bool,
    database: Option<PathBuf>,
    mapping: Option<PathBuf>,
}

fn database_path(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.destination.database))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_import(args: ImportArgs) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    if api_key.is_none() {
        warn!(
            env = %config.zotero.api_key_env,
            "no API key set, only public libraries are readable"
        );
    }

    let mapping_path = args
        .mapping
        .clone()
        .or_else(|| config.mapping_file.as_ref().map(PathBuf::from));
    let table = FieldMappingTable::load(mapping_path.as_deref())?;

    let client = ZoteroClient::new(ClientOptions::from_config(&config.zotero, api_key))?;

    let db_path = database_path(&config, args.database.as_deref());
    let storage = Storage::open(&db_path)
        .await
        .wrap_err_with(|| format!("opening destination database {}", db_path.display()))?;

    let mut import_config = ImportConfig::new(&config, args.collection_id);
    import_config.resume = args.resume;
    if args.private {
        import_config.public = false;
    }

    let job = ImportJob {
        library: args.library,
        config: import_config,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping before the next page");
            flag.store(true, Ordering::Relaxed);
        }
    });

    info!(
        library = %job.library,
        collection = job.config.collection_id,
        database = %db_path.display(),
        "importing library"
    );

    let reporter = CliProgress::new();
    let result = Importer::new(&client, &storage, &table)
        .with_cursor_store(&storage)
        .with_cancel_flag(cancel)
        .run(&job, &reporter)
        .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(Report::new(e).wrap_err(format!(
                "import of {} stopped; rerun with --resume to continue",
                job.library
            )));
        }
    };

    println!();
    println!("  Import complete!");
    println!("  Library:    {}", job.library);
    println!("  Collection: {}", job.config.collection_id);
    println!("  Items:      {}", summary.items_imported);
    if let Some(start) = summary.resumed_from {
        println!("  Resumed at: {start} ({} items in total)", summary.total_items);
    }
    println!("  Pages:      {}", summary.pages_fetched);
    println!("  Database:   {}", db_path.display());
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_runs(database: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let db_path = database_path(&config, database);
    if !db_path.exists() {
        println!("No imports recorded yet ({} does not exist).", db_path.display());
        return Ok(());
    }

    let storage = Storage::open_readonly(&db_path).await?;
    let runs = storage.list_runs().await?;
    if runs.is_empty() {
        println!("No imports recorded yet.");
        return Ok(());
    }

    for run in runs {
        let status = match run.finished_at {
            Some(finished) => format!("finished {}", finished.format("%Y-%m-%d %H:%M")),
            None => format!("unfinished, next start {}", run.next_start),
        };
        println!(
            "{}  {}:{} → collection {}  {} items  {}",
            run.id,
            run.library_type,
            run.library_id,
            run.collection_id,
            run.items_imported,
            status
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ImportProgress for CliProgress {
    fn page_fetched(&self, start: u64, entries: usize) {
        self.spinner
            .set_message(format!("Fetched page at {start} ({entries} items)"));
    }

    fn item_imported(&self, key: &str, title: &str, total: u64) {
        self.spinner
            .set_message(format!("Imported [{total}] {key} {title}"));
    }

    fn done(&self, _summary: &ImportSummary) {
        self.spinner.finish_and_clear();
    }
}
