//! # docseq Trainer
//!
//! Dataset-side workflows around the sequence grammar: loading and
//! validating `imagefolder` splits, the per-split encoding pass, decoder
//! embedding resize, and scoring of generated sequences.

pub mod config;
pub mod data;
pub mod dataset;
pub mod embedding;
pub mod metrics;
pub mod postprocess;

pub use config::DatasetConfig;
pub use data::{
    check_metadata, ground_truth_targets, load_split, load_vocabulary, save_vocabulary,
    validate_metadata, DatasetRow, DatasetSplit, RawImage, ValidationReport, ADDED_TOKENS_FILE,
};
pub use dataset::{DonutDataset, VocabGrowth};
pub use embedding::{apply_growth, resize_token_embeddings};
pub use metrics::{compute_metrics, get_metrics, MetricsReport, PairMetrics};
pub use postprocess::{normalize_prediction, PredictionCleaner};

/// Install the fmt subscriber used by the binaries.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
