//! # docseq
//!
//! Umbrella crate re-exporting the sequence grammar ([`grammar`]) and the
//! dataset and evaluation workflows ([`trainer`]).

pub use docseq_core as grammar;
pub use docseq_trainer as trainer;

pub use docseq_core::{
    ControlTokens, DocseqError, ExampleAssembler, HfTokenizer, Label, SequenceDecoder,
    SequenceEncoder, TextTokenizer, Vocabulary,
};
pub use docseq_trainer::{DatasetConfig, DatasetSplit, DonutDataset, VocabGrowth};
