//! wordbank command-line tool
//!
//! Reconciles a JSON word list into a persistent store, or exports the
//! current slot assignments in the same format.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wordbank::{
    open_store, JsonSourceReader, MigrationConfig, MigrationEngine, PersistentConfig, SlotRange,
    SourceEntry, SourceReader, WordStore, DEFAULT_PROGRESS_INTERVAL,
};

/// Reconcile daily word lists into a word store
#[derive(Parser)]
#[command(name = "wordbank")]
#[command(version, about)]
struct Cli {
    /// Data directory for the persistent store
    #[arg(short, long, env = "WORDBANK_DATA_DIR", default_value = "./wordbank.db")]
    data_dir: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    json: bool,

    /// Skip fsync after each commit
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON word list to the store
    ///
    /// The list is a JSON array of {"slot", "word", "meaning", "links", "media"}
    /// objects. Existing words move to their new slot; new words are inserted;
    /// everything else is returned to the word bank.
    Reconcile {
        /// Path to the JSON source list
        file: PathBuf,

        /// Lowest valid slot
        #[arg(long, default_value_t = 1)]
        slot_min: u16,

        /// Highest valid slot
        #[arg(long, default_value_t = 366)]
        slot_max: u16,

        /// Entries between progress reports
        #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
        progress_interval: usize,
    },

    /// Write the current slot assignments as a JSON word list
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let store = open_store(
        &cli.data_dir,
        Some(PersistentConfig {
            sync_on_write: !cli.no_sync,
        }),
    )
    .with_context(|| format!("failed to open store at {}", cli.data_dir.display()))?;
    let store = Arc::new(store);

    match cli.command {
        Commands::Reconcile {
            file,
            slot_min,
            slot_max,
            progress_interval,
        } => {
            let config = MigrationConfig {
                slot_range: SlotRange::new(slot_min, slot_max)?,
                progress_interval,
            };
            let entries = JsonSourceReader::open(&file)?.read_entries()?;
            let mut engine = MigrationEngine::new(store).with_config(config)?;
            let report = engine
                .reconcile(entries)
                .with_context(|| format!("reconciliation of {} failed", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Export { out } => {
            let entries: Vec<SourceEntry> = store
                .assigned()?
                .iter()
                .filter_map(wordbank::WordRecord::to_entry)
                .collect();
            match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    write_entries(BufWriter::new(file), &entries)?;
                }
                None => write_entries(io::stdout().lock(), &entries)?,
            }
            tracing::info!(exported = entries.len(), "export complete");
        }
    }

    Ok(())
}

fn write_entries(mut writer: impl Write, entries: &[SourceEntry]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, entries)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
