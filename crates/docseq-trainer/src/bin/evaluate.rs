//! Score generated sequences against ground truth.
//!
//! Reads JSON lines pairing a reference with a model output, optionally
//! strips special tokens and decodes the output with the sequence grammar,
//! then prints the mean of every metric as JSON.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use docseq_core::sequence::{SequenceDecoder, Vocabulary, TEXT_SEQUENCE_KEY};
use docseq_core::types::{Label, Scalar};
use docseq_trainer::{
    get_metrics, init_logging, load_vocabulary, normalize_prediction, PredictionCleaner,
};
use serde::Deserialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(about = "Score generated sequences against ground truth")]
#[command(version)]
struct Cli {
    /// JSON lines with `ground_truth` and `prediction` fields
    predictions: PathBuf,

    /// Strip eos/pad tokens and the task-start token from predictions
    #[arg(long)]
    clean: bool,

    /// End-of-sequence token removed by --clean
    #[arg(long, default_value = "</s>")]
    eos_token: String,

    /// Padding token removed by --clean
    #[arg(long, default_value = "<pad>")]
    pad_token: String,

    /// Decode predictions with the sequence grammar and score their text
    #[arg(long)]
    decode: bool,

    /// Vocabulary written by `prepare` (added_tokens.json), used by --decode
    /// to unwrap categorical tokens
    #[arg(long, requires = "decode")]
    vocab: Option<PathBuf>,

    /// Score pairs on a single thread
    #[arg(long)]
    no_parallel: bool,
}

#[derive(Deserialize)]
struct PredictionRow {
    ground_truth: String,
    prediction: String,
}

fn decoder_vocabulary(path: Option<&Path>) -> anyhow::Result<Vocabulary> {
    match path {
        Some(path) => load_vocabulary(path),
        None => Ok(Vocabulary::new()),
    }
}

// A decoded prediction is scored by its free text when it has no fields.
fn decoded_text(label: &Label) -> String {
    match label.get(TEXT_SEQUENCE_KEY) {
        Some(Label::Scalar(Scalar::Text(text))) => text.clone(),
        _ => label.to_json().to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cleaner = PredictionCleaner::new(cli.eos_token.clone(), cli.pad_token.clone())?;
    let decoder = SequenceDecoder::new()?;
    let vocab = decoder_vocabulary(cli.vocab.as_deref())?;

    let file = File::open(&cli.predictions)
        .with_context(|| format!("failed to open {}", cli.predictions.display()))?;
    let mut gt = Vec::new();
    let mut pred = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: PredictionRow = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid prediction row", line_no + 1))?;

        let mut prediction = row.prediction;
        let mut answer = row.ground_truth;
        if cli.clean {
            prediction = normalize_prediction(&cleaner.clean_generated(&prediction));
            answer = cleaner.clean_answer(&answer);
        }
        if cli.decode {
            prediction = decoded_text(&decoder.decode(&prediction, &vocab)?);
        }

        gt.push(answer);
        pred.push(prediction);
    }

    let report = get_metrics(&gt, &pred, !cli.no_parallel);
    info!(pairs = gt.len(), skipped = report.skipped, "scored predictions");
    println!("{}", serde_json::to_string_pretty(&report.means())?);

    Ok(())
}
