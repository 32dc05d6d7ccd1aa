//! Dataset Check Tool
//!
//! Validates `imagefolder` metadata files before training: every line must
//! be JSON with a `file_name` pointing at an existing image.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docseq_trainer::{check_metadata, init_logging, validate_metadata, DatasetSplit, ValidationReport};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// CLI arguments
#[derive(Parser)]
#[command(name = "dataset-check")]
#[command(about = "Validate and clean dataset metadata files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dataset root holding train/validation/test folders
    #[arg(short = 'D', long, env = "DOCSEQ_DATA_DIR", global = true, default_value = ".")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop invalid rows from metadata files
    Validate {
        /// Only this split (all splits when omitted)
        #[arg(short, long, value_enum)]
        split: Option<DatasetSplit>,

        /// Report without rewriting files
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Show row counts per split
    Status,
}

fn validate_split(root: &Path, split: DatasetSplit, dry_run: bool) -> Result<Option<ValidationReport>> {
    let path = split.metadata_path(root);
    if !path.exists() {
        warn!(split = %split, path = %path.display(), "metadata file not found");
        return Ok(None);
    }

    let report = if dry_run {
        check_metadata(&path)?.0
    } else {
        validate_metadata(&path)?
    };
    Ok(Some(report))
}

fn print_report(split: DatasetSplit, report: &ValidationReport, dry_run: bool) {
    let verb = if dry_run { "would drop" } else { "dropped" };
    println!(
        "{split:<10} kept {:>6}  {verb} {:>5} (missing file {}, missing field {}, invalid json {})",
        report.kept,
        report.dropped(),
        report.missing_file,
        report.missing_field,
        report.invalid_json
    );
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    if !cli.data_dir.is_dir() {
        anyhow::bail!("dataset root {} is not a directory", cli.data_dir.display());
    }

    match cli.command {
        Commands::Validate { split, dry_run } => {
            let splits: Vec<DatasetSplit> = match split {
                Some(split) => vec![split],
                None => DatasetSplit::ALL.to_vec(),
            };

            let mut dropped = 0;
            for split in splits {
                if let Some(report) = validate_split(&cli.data_dir, split, dry_run)? {
                    print_report(split, &report, dry_run);
                    dropped += report.dropped();
                }
            }
            if dry_run {
                info!(dropped, "dry run, nothing rewritten");
            }
        }
        Commands::Status => {
            println!("Dataset root: {}", cli.data_dir.display());
            for split in DatasetSplit::ALL {
                let path = split.metadata_path(&cli.data_dir);
                if !path.exists() {
                    println!("{split:<10} (missing)");
                    continue;
                }
                let (report, _) =
                    check_metadata(&path).with_context(|| format!("failed to check {split}"))?;
                println!("{split:<10} {:>6} rows, {} invalid", report.kept, report.dropped());
            }
        }
    }

    Ok(())
}
