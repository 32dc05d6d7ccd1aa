//! Encode dataset ground truth into Donut target sequences.
//!
//! Runs the encoding pass over the requested splits (training first, so
//! only its keys grow the vocabulary), writes the target sequences and the
//! updated tokenizer, and reports how far the decoder embeddings must grow.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use docseq_core::sequence::Vocabulary;
use docseq_core::tokenizer::{HfTokenizer, TextTokenizer, DEFAULT_PAD_TOKEN};
use docseq_trainer::{
    init_logging, save_vocabulary, DatasetConfig, DatasetSplit, DonutDataset, ADDED_TOKENS_FILE,
};
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "prepare")]
#[command(about = "Encode dataset ground truth into Donut target sequences")]
#[command(version)]
struct Cli {
    /// Dataset root holding train/validation/test folders
    #[arg(short, long, env = "DOCSEQ_DATA_DIR")]
    data_dir: PathBuf,

    /// Base tokenizer.json of the decoder
    #[arg(short, long, env = "DOCSEQ_TOKENIZER")]
    tokenizer: PathBuf,

    /// Padding token of the tokenizer
    #[arg(long, default_value = DEFAULT_PAD_TOKEN)]
    pad_token: String,

    /// JSON file with dataset settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Label length
    #[arg(long)]
    max_length: Option<usize>,

    /// Task-start token
    #[arg(long)]
    task_start_token: Option<String>,

    /// Prompt-end token (defaults to the task-start token)
    #[arg(long)]
    prompt_end_token: Option<String>,

    /// Keep JSON keys in source order
    #[arg(long)]
    no_sort_keys: bool,

    /// Token appended to every target
    #[arg(long)]
    eos_token: Option<String>,

    /// Splits to encode
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [DatasetSplit::Train, DatasetSplit::Validation])]
    splits: Vec<DatasetSplit>,

    /// Output directory
    #[arg(short, long, default_value = "prepared")]
    output: PathBuf,
}

impl Cli {
    fn dataset_config(&self) -> anyhow::Result<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasetConfig::from_file(path)?,
            None => DatasetConfig::default(),
        };
        if let Some(max_length) = self.max_length {
            config = config.with_max_length(max_length);
        }
        if let Some(token) = &self.task_start_token {
            config = config.with_task_start_token(token.clone());
        }
        if let Some(token) = &self.prompt_end_token {
            config = config.with_prompt_end_token(token.clone());
        }
        if self.no_sort_keys {
            config = config.with_sort_json_key(false);
        }
        if let Some(token) = &self.eos_token {
            config = config.with_eos_token(token.clone());
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.dataset_config()?;

    let mut tokenizer = HfTokenizer::from_file(&cli.tokenizer, &cli.pad_token)?;
    let base_size = tokenizer.vocab_size();
    let mut vocab = Vocabulary::seeded(&config.control_tokens());

    let mut splits = cli.splits.clone();
    splits.sort_by_key(|s| DatasetSplit::ALL.iter().position(|a| a == s));
    splits.dedup();

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;

    for split in splits {
        if !split.metadata_path(&cli.data_dir).exists() && split != DatasetSplit::Train {
            warn!(split = %split, "split not found, skipping");
            continue;
        }

        let (dataset, growth) =
            DonutDataset::load(&cli.data_dir, split, &config, &mut vocab, &mut tokenizer)?;
        if growth.needs_resize() {
            info!(split = %split, added = growth.added, vocab_size = growth.vocab_size, "vocabulary grew");
        }

        let out_path = cli.output.join(format!("{split}.jsonl"));
        let mut out = BufWriter::new(
            File::create(&out_path).with_context(|| format!("failed to create {}", out_path.display()))?,
        );
        for idx in 0..dataset.len() {
            let sequences = dataset.target_sequences(idx).unwrap_or_default();
            writeln!(out, "{}", json!({"index": idx, "target_sequences": sequences}))?;
        }
        out.flush()?;

        if !dataset.is_empty() {
            let example = dataset.get(0, &tokenizer)?;
            let labels: Vec<i64> = example.labels.to_vec1()?;
            debug!(
                split = %split,
                image = %example.image.path.display(),
                target = %example.target_sequence,
                first_labels = ?&labels[..labels.len().min(30)],
                "first example"
            );
        }
        info!(split = %split, examples = dataset.len(), path = %out_path.display(), "wrote targets");
    }

    save_vocabulary(&vocab, cli.output.join(ADDED_TOKENS_FILE))?;
    tokenizer.save(cli.output.join("tokenizer.json"))?;

    let final_size = tokenizer.vocab_size();
    println!("Original number of tokens: {base_size}");
    println!("Number of tokens after adding special tokens: {final_size}");
    if final_size != base_size {
        println!("Resize decoder token embeddings to {final_size} rows before training");
    }

    Ok(())
}
