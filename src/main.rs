use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use tag_store::database::FileId;
use tag_store::ingest::{hasher, pipeline};
use tag_store::utils::config::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database file; defaults to $XDG_DATA_HOME/tag-store/db.sqlite3
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fingerprint files (directories recursively) and tag them
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(short, long, default_value_t = 4)]
        workers: usize,
    },
    /// Tags attached to a file
    Tags { file_id: i64 },
    /// Files carrying a tag
    Files { tag: String },
    /// Stored files whose content matches a file on disk
    Lookup { path: PathBuf },
    /// Every known tag
    ListTags,
}

fn emit<T: Serialize>(json: bool, value: &T, lines: impl FnOnce(&T) -> Vec<String>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        for line in lines(value) {
            println!("{line}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env()?.with_database_path(args.db_path.as_deref());

    let level = if settings.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut store = settings.open_store().context("Failed to open tag store")?;

    match args.command {
        Command::Add {
            paths,
            tags,
            workers,
        } => {
            info!("Indexing {} path(s) with {} tag(s)", paths.len(), tags.len());
            let summary = pipeline::index_paths(&mut store, &paths, tags, workers)?;
            emit(args.json, &summary, |s| {
                vec![format!(
                    "{} file(s) stored, {} tagged, {} failed",
                    s.files, s.tagged, s.failed
                )]
            })?;
        }
        Command::Tags { file_id } => {
            let id = FileId(file_id);
            store
                .get_file(id)?
                .with_context(|| format!("No file with id {id}"))?;
            let tags = store.tags_for_file(id)?;
            emit(args.json, &tags, |tags| tags.iter().map(|t| t.name.clone()).collect())?;
        }
        Command::Files { tag } => {
            let files = store.files_for_tag_name(&tag)?;
            emit(args.json, &files, |files| {
                files
                    .iter()
                    .map(|f| format!("{}\t{}\t{}", f.id, f.fingerprint, f.name))
                    .collect()
            })?;
        }
        Command::Lookup { path } => {
            let fingerprint = hasher::calculate_hash(&path)?;
            let files = store.find_files_by_fingerprint(&fingerprint)?;
            emit(args.json, &files, |files| {
                files
                    .iter()
                    .map(|f| format!("{}\t{}", f.id, f.name))
                    .collect()
            })?;
        }
        Command::ListTags => {
            let tags = store.list_tags()?;
            emit(args.json, &tags, |tags| {
                tags.iter().map(|t| format!("{}\t{}", t.id, t.name)).collect()
            })?;
        }
    }

    Ok(())
}
