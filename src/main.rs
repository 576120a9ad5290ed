mod archive;
mod db;
mod error;
mod parser;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(name = "edinet_indexer", about = "Structure EDINET filing archives into searchable sections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Structure one filing archive and save its sections
    Process {
        /// Path to the filing ZIP
        zip: PathBuf,
        /// Document identifier (default: the archive file stem)
        #[arg(long)]
        doc_id: Option<String>,
        /// Batch date (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Sequence number within the batch
        #[arg(long, default_value = "1")]
        seq: i64,
    },
    /// Structure every *.zip in a directory, sequentially
    Batch {
        /// Directory of filing ZIPs
        dir: PathBuf,
        /// Max archives to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Batch date (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Print a stored document's sections as JSON
    Export {
        /// Document identifier
        doc_id: String,
    },
    /// Full-text search over stored sections
    Search {
        query: String,
        /// Max hits to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show indexing statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            println!("Schema ready.");
            Ok(())
        }
        Commands::Process { zip, doc_id, date, seq } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let date = date.unwrap_or_else(today);
            let doc_id = doc_id.unwrap_or_else(|| file_stem(&zip));
            let count = process_one(&conn, &date, seq, &doc_id, &zip)?;
            println!("{}: {} sections saved.", doc_id, count);
            Ok(())
        }
        Commands::Batch { dir, limit, date } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let date = date.unwrap_or_else(today);
            let zips = list_zips(&dir, limit)?;
            if zips.is_empty() {
                println!("No archives found in {}.", dir.display());
                return Ok(());
            }
            println!("Processing {} archives...", zips.len());
            let counts = process_batch(&conn, &date, &zips)?;
            counts.print();
            Ok(())
        }
        Commands::Export { doc_id } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let sections = db::fetch_sections(&conn, &doc_id)?;
            if sections.is_empty() {
                println!("No sections stored for {}.", doc_id);
                return Ok(());
            }
            println!("{}", serde_json::to_string_pretty(&sections)?);
            Ok(())
        }
        Commands::Search { query, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let hits = db::search_sections(&conn, &query, limit)?;
            if hits.is_empty() {
                println!("No matches.");
                return Ok(());
            }
            for hit in &hits {
                println!(
                    "{} #{:<3} {:<40} {}",
                    hit.doc_id,
                    hit.seq,
                    truncate(&hit.breadcrumb, 40),
                    hit.snippet
                );
            }
            println!("\n{} hits", hits.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents: {}", s.documents);
            println!("Sections:  {}", s.sections);
            println!("Dates:     {}", s.dates);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct BatchCounts {
    documents: usize,
    sections: usize,
    skipped: usize,
    errors: usize,
}

impl BatchCounts {
    fn print(&self) {
        println!(
            "Saved {} documents ({} sections); {} already stored, {} failed.",
            self.documents, self.sections, self.skipped, self.errors,
        );
    }
}

/// Structure one archive and hand its sections to the sink.
fn process_one(
    conn: &rusqlite::Connection,
    date: &str,
    seq: i64,
    doc_id: &str,
    zip_path: &Path,
) -> Result<usize> {
    let bytes = fs::read(zip_path).with_context(|| format!("reading {}", zip_path.display()))?;
    let sections = parser::structure_document(doc_id, &bytes)?;
    db::save_document(conn, date, seq, doc_id, None, &sections)?;
    Ok(sections.len())
}

/// Process archives one at a time. A document that fails extraction or
/// parsing is logged and dropped; the batch keeps going.
fn process_batch(
    conn: &rusqlite::Connection,
    date: &str,
    zips: &[PathBuf],
) -> Result<BatchCounts> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(zips.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut counts = BatchCounts {
        documents: 0,
        sections: 0,
        skipped: 0,
        errors: 0,
    };

    for (i, zip_path) in zips.iter().enumerate() {
        let doc_id = file_stem(zip_path);
        if db::is_processed(conn, &doc_id)? {
            counts.skipped += 1;
            pb.inc(1);
            continue;
        }
        match process_one(conn, date, (i + 1) as i64, &doc_id, zip_path) {
            Ok(section_count) => {
                counts.documents += 1;
                counts.sections += section_count;
            }
            Err(e) => {
                warn!("Failed to structure {}: {:#}", doc_id, e);
                counts.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn list_zips(dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut zips: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .collect();
    zips.sort();
    if let Some(n) = limit {
        zips.truncate(n);
    }
    Ok(zips)
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
