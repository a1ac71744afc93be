//! multifile: command-line tool for file-list column values.
//!
//! Decodes and encodes stored strings, commits local files into a
//! filesystem media root, and inspects what a stored string points to.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use multifile_core::{
    CommitCoordinator, FieldValue, FileListField, FileModel, ListEncoding, MultifileConfig,
    RecordKey, StorageBackend, StringListCodec, Upload,
};
use multifile_db::{create_pool, FilesystemStorage, PgRecordStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "multifile")]
#[command(author, version, about = "Inspect and produce multi-file column values")]
#[command(propagate_version = true)]
struct Cli {
    /// TOML configuration file (falls back to MULTIFILE_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Stored-string layout (overrides the configuration)
    #[arg(short, long, global = true)]
    encoding: Option<ListEncoding>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a stored string into file names
    Decode {
        /// Stored column value
        raw: String,

        /// Print a JSON array instead of one name per line
        #[arg(long)]
        json: bool,
    },

    /// Encode file names into a stored string
    Encode {
        /// File names in order
        names: Vec<String>,
    },

    /// Commit local files into a media root and print the stored string
    Store {
        /// Media root (default: configured media root)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// strftime pattern for the upload directory
        #[arg(short, long)]
        upload_to: Option<String>,

        /// Maximum length of the stored string
        #[arg(short, long)]
        max_length: Option<usize>,

        /// Local files to store
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Show existence and size of every file a stored string refers to
    Inspect {
        /// Media root (default: configured media root)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Stored column value
        raw: String,
    },

    /// Load a record from PostgreSQL (DATABASE_URL) and list its files
    Show {
        /// Table holding the record
        #[arg(short, long)]
        model: String,

        /// Column of the file-list field
        #[arg(short, long)]
        field: String,

        /// Record id
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _guard = init_logging();

    let cli = Cli::parse();
    let mut config = MultifileConfig::load(cli.config.as_deref())?;
    if let Some(encoding) = cli.encoding {
        config.encoding = encoding;
    }

    match cli.command {
        Commands::Decode { raw, json } => cmd_decode(&config, &raw, json)?,
        Commands::Encode { names } => cmd_encode(&config, &names),
        Commands::Store {
            root,
            upload_to,
            max_length,
            files,
        } => {
            if let Some(root) = root {
                config.media_root = root;
            }
            if let Some(pattern) = upload_to {
                config.upload_to = pattern;
            }
            if let Some(max_length) = max_length {
                config.max_length = max_length;
            }
            config.validate()?;
            cmd_store(&config, &files).await?
        }
        Commands::Inspect { root, raw } => {
            if let Some(root) = root {
                config.media_root = root;
            }
            cmd_inspect(&config, &raw).await?
        }
        Commands::Show { model, field, id } => cmd_show(&config, &model, &field, id).await?,
    }
    Ok(())
}

/// Initialize tracing on stderr, or into `LOG_FILE` with daily rotation.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional)
///   RUST_LOG    - standard env filter (default: "warn")
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = Path::new(path);
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("multifile.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    }
}

fn cmd_decode(config: &MultifileConfig, raw: &str, json: bool) -> anyhow::Result<()> {
    let names = StringListCodec::new(config.encoding).decode(raw);
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

fn cmd_encode(config: &MultifileConfig, names: &[String]) {
    println!("{}", StringListCodec::new(config.encoding).encode(names));
}

fn storage(config: &MultifileConfig) -> Arc<FilesystemStorage> {
    Arc::new(FilesystemStorage::new(
        config.media_root.clone(),
        config.media_url.clone(),
    ))
}

async fn cmd_store(config: &MultifileConfig, paths: &[PathBuf]) -> anyhow::Result<()> {
    let storage = storage(config);
    storage
        .validate()
        .await
        .with_context(|| format!("media root {} is not usable", config.media_root.display()))?;
    let field = config.field("files", storage);

    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?;
        uploads.push(Upload::new(name, content));
    }

    let uploads = field
        .formfield(false)
        .clean(Some(uploads))
        .map_err(multifile_core::Error::from)?
        .unwrap_or_default();

    let key = RecordKey::new("cli", Uuid::now_v7());
    let mut value = FieldValue::from(uploads);
    let outcome = CommitCoordinator::new(&field)
        .pre_save(&key, &mut value)
        .await?;

    info!(
        subsystem = "cli",
        op = "store",
        file_count = outcome.committed.len(),
        "Files stored"
    );
    println!("{}", outcome.stored);
    Ok(())
}

async fn cmd_inspect(config: &MultifileConfig, raw: &str) -> anyhow::Result<()> {
    let field = config.field("files", storage(config));
    let mut value = FieldValue::from(raw);
    let handles = field.accessor().read(None, &mut value);
    print_files(&field, handles).await
}

async fn cmd_show(config: &MultifileConfig, model: &str, field: &str, id: Uuid) -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let store = PgRecordStore::new(create_pool(&database_url).await?);
    let model = FileModel::new(model).with_field(config.field(field, storage(config)));

    let Some(mut record) = model.load(&store, id).await? else {
        bail!("record {} not found", id);
    };
    let handles = model.files(&mut record, field)?;
    print_files(model.field(field)?, handles).await
}

async fn print_files(
    field: &FileListField,
    handles: &[multifile_core::FileHandle],
) -> anyhow::Result<()> {
    let storage = field.storage();
    let mut rows = Vec::with_capacity(handles.len());
    for handle in handles {
        let Some(name) = handle.name() else {
            continue;
        };
        let exists = storage.exists(name).await.unwrap_or(false);
        let size = if exists { handle.size().await.ok() } else { None };
        rows.push(serde_json::json!({
            "name": name,
            "exists": exists,
            "size": size,
            "url": handle.url().ok(),
        }));
    }
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
