//! Per-split Donut dataset.
//!
//! Loading a split runs the encoding pass over every row once, in file
//! order, so vocabulary growth and the resulting token ids are the same
//! on every run. Tokenization and masking happen lazily in [`DonutDataset::get`].

use std::path::Path;

use anyhow::bail;
use docseq_core::sequence::{EncodedExample, ExampleAssembler, SequenceEncoder, Vocabulary};
use docseq_core::tokenizer::TextTokenizer;
use oorandom::Rand32;
use tracing::info;

use crate::config::DatasetConfig;
use crate::data::{load_split, DatasetRow, DatasetSplit, RawImage};

/// Vocabulary growth caused by loading a split.
///
/// When `added` is non-zero the decoder embedding table must be resized to
/// `vocab_size` rows before the next forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabGrowth {
    /// Tokens new to the tokenizer.
    pub added: usize,
    /// Tokenizer vocabulary size after the pass.
    pub vocab_size: usize,
}

impl VocabGrowth {
    /// Whether embeddings need resizing.
    pub fn needs_resize(&self) -> bool {
        self.added > 0
    }
}

/// Encoded targets for one split.
#[derive(Debug, Clone)]
pub struct DonutDataset {
    split: DatasetSplit,
    images: Vec<RawImage>,
    targets: Vec<Vec<String>>,
    assembler: ExampleAssembler,
    seed: u64,
}

impl DonutDataset {
    /// Load a split from `root` and encode its ground truth.
    pub fn load<T: TextTokenizer>(
        root: &Path,
        split: DatasetSplit,
        config: &DatasetConfig,
        vocab: &mut Vocabulary,
        tokenizer: &mut T,
    ) -> anyhow::Result<(Self, VocabGrowth)> {
        let rows = load_split(root, split)?;
        Ok(Self::from_rows(rows, split, config, vocab, tokenizer))
    }

    /// Encode already loaded rows.
    pub fn from_rows<T: TextTokenizer>(
        rows: Vec<DatasetRow>,
        split: DatasetSplit,
        config: &DatasetConfig,
        vocab: &mut Vocabulary,
        tokenizer: &mut T,
    ) -> (Self, VocabGrowth) {
        let mark = vocab.len();
        let control = config.control_tokens();
        vocab.register_tokens([control.task_start.as_str(), control.prompt_end.as_str()]);
        vocab.register_tokens([control.newline.as_str()]);
        vocab.register_categorical(&config.categorical_values);

        let encoder = SequenceEncoder::new(split.grows_vocabulary(), config.sort_json_key);
        let mut images = Vec::with_capacity(rows.len());
        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            let sequences = row
                .targets
                .iter()
                .map(|label| {
                    let mut sequence = encoder.encode(label, vocab);
                    if let Some(eos) = &config.eos_token {
                        sequence.push_str(eos);
                    }
                    sequence
                })
                .collect();
            images.push(row.image);
            targets.push(sequences);
        }

        // control tokens go first even when the vocabulary was seeded earlier
        let mut pending = vec![control.task_start, control.prompt_end, control.newline];
        pending.extend_from_slice(vocab.added_since(mark));
        let added = tokenizer.add_tokens(&pending);
        let growth = VocabGrowth {
            added,
            vocab_size: tokenizer.vocab_size(),
        };
        info!(
            split = %split,
            rows = images.len(),
            added = growth.added,
            vocab_size = growth.vocab_size,
            "encoded split"
        );

        let dataset = Self {
            split,
            images,
            targets,
            assembler: config.assembler(),
            seed: config.seed,
        };
        (dataset, growth)
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the split has no examples.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The split this dataset was loaded from.
    pub fn split(&self) -> DatasetSplit {
        self.split
    }

    /// Candidate target sequences of one example.
    pub fn target_sequences(&self, idx: usize) -> Option<&[String]> {
        self.targets.get(idx).map(Vec::as_slice)
    }

    /// Assemble example `idx`.
    ///
    /// With several candidate targets one is picked by a generator seeded
    /// from the dataset seed and the index, so repeated calls agree.
    pub fn get<T: TextTokenizer + ?Sized>(
        &self,
        idx: usize,
        tokenizer: &T,
    ) -> anyhow::Result<EncodedExample<RawImage>> {
        let Some(candidates) = self.targets.get(idx) else {
            bail!("index {idx} out of range for {} examples", self.len());
        };
        let target = match candidates.len() {
            0 => String::new(),
            1 => candidates[0].clone(),
            n => {
                let mut rng = Rand32::new(self.seed ^ idx as u64);
                candidates[rng.rand_range(0..n as u32) as usize].clone()
            }
        };
        Ok(self
            .assembler
            .assemble_sequence(self.images[idx].clone(), target, tokenizer)?)
    }

    /// Visiting order for one epoch: shuffled for training, in order
    /// otherwise.
    pub fn epoch_order(&self, epoch: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        if self.split.grows_vocabulary() {
            let mut rng = Rand32::new(self.seed.wrapping_add(epoch));
            for i in (1..indices.len()).rev() {
                let j = rng.rand_range(0..(i as u32 + 1)) as usize;
                indices.swap(i, j);
            }
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::write_split;
    use docseq_core::Result as CoreResult;
    use serde_json::json;

    /// Splits on whitespace; ids are positions in an append-only table.
    struct WhitespaceTokenizer {
        vocab: Vec<String>,
    }

    impl WhitespaceTokenizer {
        fn new() -> Self {
            Self {
                vocab: vec!["<pad>".to_string()],
            }
        }

        fn id(&self, token: &str) -> Option<u32> {
            self.vocab.iter().position(|t| t == token).map(|i| i as u32)
        }
    }

    impl TextTokenizer for WhitespaceTokenizer {
        fn encode_ids(&self, text: &str) -> CoreResult<Vec<u32>> {
            Ok(text
                .split_whitespace()
                .map(|w| self.id(w).unwrap_or(u32::MAX))
                .collect())
        }

        fn add_tokens(&mut self, tokens: &[String]) -> usize {
            let mut added = 0;
            for token in tokens {
                if self.id(token).is_none() {
                    self.vocab.push(token.clone());
                    added += 1;
                }
            }
            added
        }

        fn vocab_size(&self) -> usize {
            self.vocab.len()
        }

        fn pad_id(&self) -> u32 {
            0
        }
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        write_split(
            root.path(),
            DatasetSplit::Train,
            &[
                ("0.png", json!({"gt_parse": {"row": ["a", "b"]}}), true),
                ("1.png", json!({"gt_parse": {"caption": "c"}}), true),
            ],
        );
        write_split(
            root.path(),
            DatasetSplit::Validation,
            &[("2.png", json!({"gt_parse": {"footer": "d"}}), true)],
        );
        root
    }

    #[test]
    fn training_split_grows_vocabulary_once() {
        let root = fixture();
        let config = DatasetConfig::new().with_max_length(4);
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();

        let (train, growth) =
            DonutDataset::load(root.path(), DatasetSplit::Train, &config, &mut vocab, &mut tokenizer)
                .unwrap();
        assert_eq!(train.len(), 2);
        assert!(growth.needs_resize());
        // <s>, [NEWLINE], then two tag pairs
        assert_eq!(growth.added, 6);
        assert_eq!(growth.vocab_size, 7);
        assert_eq!(
            train.target_sequences(0).unwrap(),
            &["<s_row>a<sep/>b</s_row>".to_string()]
        );

        let (_, again) =
            DonutDataset::load(root.path(), DatasetSplit::Train, &config, &mut vocab, &mut tokenizer)
                .unwrap();
        assert!(!again.needs_resize());
    }

    #[test]
    fn evaluation_split_does_not_register_keys() {
        let root = fixture();
        let config = DatasetConfig::new();
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();

        let (val, _) = DonutDataset::load(
            root.path(),
            DatasetSplit::Validation,
            &config,
            &mut vocab,
            &mut tokenizer,
        )
        .unwrap();
        assert_eq!(val.target_sequences(0).unwrap(), &["<s_footer>d</s_footer>".to_string()]);
        assert!(!vocab.contains("<s_footer>"));
    }

    #[test]
    fn get_masks_padding() {
        let root = fixture();
        let config = DatasetConfig::new().with_max_length(4).with_eos_token(" </s>");
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();
        tokenizer.add_tokens(&["</s>".to_string()]);

        let (train, _) =
            DonutDataset::load(root.path(), DatasetSplit::Train, &config, &mut vocab, &mut tokenizer)
                .unwrap();
        assert_eq!(
            train.target_sequences(1).unwrap(),
            &["<s_caption>c</s_caption> </s>".to_string()]
        );

        let example = train.get(1, &tokenizer).unwrap();
        assert_eq!(example.image.path, root.path().join("train").join("1.png"));
        let labels: Vec<i64> = example.labels.to_vec1().unwrap();
        let eos = i64::from(tokenizer.id("</s>").unwrap());
        assert_eq!(labels, vec![i64::from(u32::MAX), eos, -100, -100]);

        assert!(train.get(5, &tokenizer).is_err());
    }

    #[test]
    fn configured_categorical_values_are_registered() {
        let rows = vec![DatasetRow {
            image: RawImage {
                path: "c.png".into(),
            },
            targets: vec![docseq_core::Label::mapping([
                ("flag", docseq_core::Label::text("yes")),
                ("note", docseq_core::Label::text("maybe")),
            ])],
        }];
        let config = DatasetConfig::new().with_categorical_values(["yes", "no"]);
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();

        let (dataset, _) =
            DonutDataset::from_rows(rows, DatasetSplit::Train, &config, &mut vocab, &mut tokenizer);
        assert_eq!(
            dataset.target_sequences(0).unwrap(),
            &["<s_note>maybe</s_note><s_flag><yes/></s_flag>".to_string()]
        );
        assert!(vocab.contains("<no/>"));
        assert!(tokenizer.id("<yes/>").is_some());
    }

    #[test]
    fn multiple_targets_pick_deterministically() {
        let rows = vec![DatasetRow {
            image: RawImage {
                path: "q.png".into(),
            },
            targets: vec![
                docseq_core::Label::text("one"),
                docseq_core::Label::text("two"),
                docseq_core::Label::text("three"),
            ],
        }];
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();
        let (dataset, _) = DonutDataset::from_rows(
            rows,
            DatasetSplit::Test,
            &DatasetConfig::new().with_seed(7),
            &mut vocab,
            &mut tokenizer,
        );

        let first = dataset.get(0, &tokenizer).unwrap().target_sequence;
        let second = dataset.get(0, &tokenizer).unwrap().target_sequence;
        assert_eq!(first, second);
        assert!(["one", "two", "three"].contains(&first.as_str()));
    }

    #[test]
    fn epoch_order_shuffles_training_only() {
        let rows: Vec<DatasetRow> = (0..20)
            .map(|i| DatasetRow {
                image: RawImage {
                    path: format!("{i}.png").into(),
                },
                targets: vec![docseq_core::Label::text("x")],
            })
            .collect();
        let mut vocab = Vocabulary::new();
        let mut tokenizer = WhitespaceTokenizer::new();
        let config = DatasetConfig::new().with_seed(3);

        let (train, _) =
            DonutDataset::from_rows(rows.clone(), DatasetSplit::Train, &config, &mut vocab, &mut tokenizer);
        let order = train.epoch_order(0);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
        assert_eq!(order, train.epoch_order(0));
        assert_ne!(order, train.epoch_order(1));

        let (test, _) =
            DonutDataset::from_rows(rows, DatasetSplit::Test, &config, &mut vocab, &mut tokenizer);
        assert_eq!(test.epoch_order(4), (0..20).collect::<Vec<_>>());
    }
}
