//! # Example Assembler
//!
//! Builds one training-ready example: the image is forwarded untouched,
//! the ground truth is linearized, tokenized, truncated or right-padded to
//! a fixed length, and padding is masked out with the ignore id.

use candle_core::{Device, Tensor};

use crate::error::Result;
use crate::sequence::encoder::SequenceEncoder;
use crate::sequence::vocab::Vocabulary;
use crate::tokenizer::TextTokenizer;
use crate::types::Label;

/// Label value skipped by cross-entropy losses.
pub const DEFAULT_IGNORE_ID: i64 = -100;

/// Default decoder length for table targets.
pub const DEFAULT_MAX_LENGTH: usize = 768;

/// One assembled example.
#[derive(Debug, Clone)]
pub struct EncodedExample<I> {
    /// The raw image, as handed in.
    pub image: I,
    /// `i64` tensor of shape `(max_length,)`.
    pub labels: Tensor,
    /// The linearized target before tokenization.
    pub target_sequence: String,
    /// Growth of the tokenizer vocabulary caused by this example.
    /// Non-zero means the decoder embeddings must be resized.
    pub new_tokens: usize,
}

/// Fixed-length label builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleAssembler {
    /// Number of label positions.
    pub max_length: usize,
    /// Value written over padding positions.
    pub ignore_id: i64,
}

impl Default for ExampleAssembler {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            ignore_id: DEFAULT_IGNORE_ID,
        }
    }
}

impl ExampleAssembler {
    /// Create an assembler.
    pub fn new(max_length: usize, ignore_id: i64) -> Self {
        Self {
            max_length,
            ignore_id,
        }
    }

    /// Encode `label` and assemble it with `image`.
    ///
    /// Structural tokens registered during encoding are pushed into the
    /// tokenizer before tokenizing, so they are never split into subwords.
    pub fn assemble<I, T>(
        &self,
        image: I,
        label: &Label,
        encoder: &SequenceEncoder,
        vocab: &mut Vocabulary,
        tokenizer: &mut T,
    ) -> Result<EncodedExample<I>>
    where
        T: TextTokenizer,
    {
        let mark = vocab.len();
        let target = encoder.encode(label, vocab);
        let new_tokens = if vocab.len() > mark {
            tokenizer.add_tokens(vocab.added_since(mark))
        } else {
            0
        };

        let mut example = self.assemble_sequence(image, target, tokenizer)?;
        example.new_tokens = new_tokens;
        Ok(example)
    }

    /// Assemble an already linearized target sequence.
    pub fn assemble_sequence<I, T>(
        &self,
        image: I,
        target_sequence: String,
        tokenizer: &T,
    ) -> Result<EncodedExample<I>>
    where
        T: TextTokenizer + ?Sized,
    {
        let ids = tokenizer.encode_ids(&target_sequence)?;
        let masked = pad_and_mask(&ids, self.max_length, tokenizer.pad_id(), self.ignore_id);
        let labels = Tensor::new(masked.as_slice(), &Device::Cpu)?;

        Ok(EncodedExample {
            image,
            labels,
            target_sequence,
            new_tokens: 0,
        })
    }
}

/// Truncate or right-pad `ids` to `max_length`, then replace every
/// position holding `pad_id` with `ignore_id`.
///
/// Overflow is dropped silently.
///
/// # Examples
/// ```
/// use docseq_core::sequence::pad_and_mask;
///
/// assert_eq!(pad_and_mask(&[5, 7, 2], 5, 0, -100), vec![5, 7, 2, -100, -100]);
/// ```
pub fn pad_and_mask(ids: &[u32], max_length: usize, pad_id: u32, ignore_id: i64) -> Vec<i64> {
    ids.iter()
        .copied()
        .chain(std::iter::repeat(pad_id))
        .take(max_length)
        .map(|id| if id == pad_id { ignore_id } else { i64::from(id) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tests::word_level;

    #[test]
    fn pads_and_masks_to_max_length() {
        let labels = pad_and_mask(&[5, 7, 2], 10, 0, -100);
        assert_eq!(labels, vec![5, 7, 2, -100, -100, -100, -100, -100, -100, -100]);
    }

    #[test]
    fn truncates_without_masking() {
        let ids: Vec<u32> = (1..=15).collect();
        let labels = pad_and_mask(&ids, 10, 0, -100);
        assert_eq!(labels, (1..=10).collect::<Vec<i64>>());
        assert!(!labels.contains(&-100));
    }

    #[test]
    fn in_sequence_pad_ids_are_masked_too() {
        assert_eq!(pad_and_mask(&[3, 0, 4], 4, 0, -1), vec![3, -1, 4, -1]);
    }

    #[test]
    fn assemble_syncs_new_tokens_and_builds_tensor() {
        let mut tokenizer = word_level();
        let mut vocab = Vocabulary::new();
        let label = Label::mapping([("greeting", Label::text("hello world"))]);
        let assembler = ExampleAssembler::new(8, -100);

        let example = assembler
            .assemble("page.png", &label, &SequenceEncoder::default(), &mut vocab, &mut tokenizer)
            .unwrap();

        assert_eq!(example.image, "page.png");
        assert_eq!(example.target_sequence, "<s_greeting>hello world</s_greeting>");
        assert_eq!(example.new_tokens, 2);
        assert_eq!(example.labels.dims(), &[8]);

        let open = i64::from(tokenizer.token_to_id("<s_greeting>").unwrap());
        let close = i64::from(tokenizer.token_to_id("</s_greeting>").unwrap());
        let values: Vec<i64> = example.labels.to_vec1().unwrap();
        assert_eq!(values, vec![open, 2, 3, close, -100, -100, -100, -100]);
    }

    #[test]
    fn second_assembly_reports_no_growth() {
        let mut tokenizer = word_level();
        let mut vocab = Vocabulary::new();
        let label = Label::mapping([("greeting", Label::text("hello"))]);
        let assembler = ExampleAssembler::new(4, -100);
        let encoder = SequenceEncoder::default();

        assembler.assemble((), &label, &encoder, &mut vocab, &mut tokenizer).unwrap();
        let again = assembler.assemble((), &label, &encoder, &mut vocab, &mut tokenizer).unwrap();
        assert_eq!(again.new_tokens, 0);
    }
}
