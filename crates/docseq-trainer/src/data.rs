//! Data loading for `imagefolder`-style datasets.
//!
//! Each split lives in `<root>/<split>/` next to a `metadata.jsonl` file
//! whose rows name an image and carry its ground truth:
//!
//! ```text
//! {"file_name": "0001.png", "ground_truth": "{\"gt_parse\": {...}}"}
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::ValueEnum;
use docseq_core::sequence::{Vocabulary, TEXT_SEQUENCE_KEY};
use docseq_core::types::Label;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Name of the per-split metadata file.
pub const METADATA_FILE: &str = "metadata.jsonl";

/// File the prepared vocabulary is written to.
pub const ADDED_TOKENS_FILE: &str = "added_tokens.json";

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSplit {
    /// Training rows; the only split that grows the vocabulary.
    Train,
    /// Held-out rows scored during training.
    Validation,
    /// Final evaluation rows.
    Test,
}

impl DatasetSplit {
    /// All splits in preparation order.
    pub const ALL: [DatasetSplit; 3] = [Self::Train, Self::Validation, Self::Test];

    /// Directory name under the dataset root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }

    /// Only the training split may add structural tokens, so evaluation
    /// labels never leak into the vocabulary.
    pub fn grows_vocabulary(&self) -> bool {
        matches!(self, Self::Train)
    }

    /// Path of this split's metadata file.
    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name()).join(METADATA_FILE)
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.dir_name())
    }
}

/// Image reference, forwarded to the image processor untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Location of the encoded image file.
    pub path: PathBuf,
}

impl RawImage {
    /// Read the encoded image bytes.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// One row of `metadata.jsonl`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRow {
    /// Image file name, relative to the split directory.
    pub file_name: String,
    /// Ground truth in any of the forms [`ground_truth_targets`] accepts.
    pub ground_truth: Value,
}

/// A loaded dataset row: the image and its candidate targets.
#[derive(Debug, Clone)]
pub struct DatasetRow {
    /// The row's image.
    pub image: RawImage,
    /// Candidate targets; never empty.
    pub targets: Vec<Label>,
}

/// Interpret a `ground_truth` value.
///
/// * a string holding a JSON object or array is parsed first
/// * `{"gt_parses": [...]}` gives one target per element
/// * `{"gt_parse": {...}}` gives one target
/// * any other JSON is used as-is
/// * plain text becomes a `text_sequence` passthrough target
pub fn ground_truth_targets(value: &Value) -> Vec<Label> {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => ground_truth_targets(&parsed),
            _ => vec![Label::mapping([(TEXT_SEQUENCE_KEY, Label::text(text.clone()))])],
        },
        Value::Object(map) => {
            if let Some(Value::Array(parses)) = map.get("gt_parses") {
                parses.iter().cloned().map(Label::from).collect()
            } else if let Some(parse) = map.get("gt_parse") {
                vec![Label::from(parse.clone())]
            } else {
                vec![Label::from(value.clone())]
            }
        }
        other => vec![Label::from(other.clone())],
    }
}

/// Load one split from a dataset root.
pub fn load_split(root: &Path, split: DatasetSplit) -> anyhow::Result<Vec<DatasetRow>> {
    let metadata = split.metadata_path(root);
    let file = File::open(&metadata)
        .with_context(|| format!("failed to open {}", metadata.display()))?;
    let reader = BufReader::new(file);
    let dir = root.join(split.dir_name());

    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let row: MetadataRow = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid metadata row", metadata.display(), line_no + 1))?;
        let targets = ground_truth_targets(&row.ground_truth);
        if targets.is_empty() {
            bail!("{}:{}: ground truth has no targets", metadata.display(), line_no + 1);
        }

        debug!(file = %row.file_name, targets = targets.len(), "loaded row");
        rows.push(DatasetRow {
            image: RawImage {
                path: dir.join(&row.file_name),
            },
            targets,
        });
    }

    info!(split = %split, rows = rows.len(), "loaded split");
    Ok(rows)
}

/// Outcome of checking a metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Rows that parsed and point at an existing file.
    pub kept: usize,
    /// Rows whose image file does not exist.
    pub missing_file: usize,
    /// Rows without a `file_name`.
    pub missing_field: usize,
    /// Lines that are not valid JSON.
    pub invalid_json: usize,
}

impl ValidationReport {
    /// Number of dropped rows.
    pub fn dropped(&self) -> usize {
        self.missing_file + self.missing_field + self.invalid_json
    }
}

/// Check a metadata file without modifying it.
///
/// Returns the report and the lines that passed.
pub fn check_metadata<P: AsRef<Path>>(path: P) -> anyhow::Result<(ValidationReport, Vec<String>)> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut report = ValidationReport::default();
    let mut valid = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(line.trim()) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, line, "not a valid JSON line");
                report.invalid_json += 1;
                continue;
            }
        };

        match value.get("file_name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {
                let image = dir.join(name);
                if image.exists() {
                    valid.push(line.to_string());
                    report.kept += 1;
                } else {
                    warn!(path = %image.display(), "image file does not exist");
                    report.missing_file += 1;
                }
            }
            _ => {
                warn!(line, "file_name field missing");
                report.missing_field += 1;
            }
        }
    }

    Ok((report, valid))
}

/// Drop invalid rows from a metadata file and rewrite it in place.
pub fn validate_metadata<P: AsRef<Path>>(path: P) -> anyhow::Result<ValidationReport> {
    let path = path.as_ref();
    let (report, valid) = check_metadata(path)?;

    let mut contents = valid.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(path, contents).with_context(|| format!("failed to rewrite {}", path.display()))?;

    info!(kept = report.kept, dropped = report.dropped(), "validated {}", path.display());
    Ok(report)
}

/// Write the vocabulary as a JSON array in registration order.
pub fn save_vocabulary<P: AsRef<Path>>(vocab: &Vocabulary, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_string_pretty(vocab.tokens())?)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Read a vocabulary written by [`save_vocabulary`].
pub fn load_vocabulary<P: AsRef<Path>>(path: P) -> anyhow::Result<Vocabulary> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tokens: Vec<String> =
        serde_json::from_str(&text).with_context(|| format!("invalid token list {}", path.display()))?;
    Ok(Vocabulary::from_tokens(tokens))
}
