//! # docseq Core
//!
//! Supervision-data preparation for Donut-style document parsers. Turns
//! nested JSON ground truth into a flat token sequence, keeps the growing
//! vocabulary of structural tokens, and builds fixed-length label tensors.
//!
//! ## Quick Start
//!
//! ```rust
//! use docseq_core::sequence::{ControlTokens, SequenceEncoder, Vocabulary};
//! use docseq_core::types::Label;
//!
//! let mut vocab = Vocabulary::seeded(&ControlTokens::default());
//! let label = Label::from_json_str(r#"{"row": ["a", "b"], "caption": "totals"}"#).unwrap();
//! let target = SequenceEncoder::default().encode(&label, &mut vocab);
//!
//! assert_eq!(target, "<s_row>a<sep/>b</s_row><s_caption>totals</s_caption>");
//! assert!(vocab.contains("<s_row>"));
//! ```
pub mod error;
pub mod sequence;
pub mod tokenizer;
pub mod types;

// Re-export primary API
pub use error::{DocseqError, Result};
pub use sequence::{
    pad_and_mask, ControlTokens, EncodedExample, ExampleAssembler, SequenceDecoder, SequenceEncoder,
    Vocabulary,
};
pub use tokenizer::{HfTokenizer, TextTokenizer};
pub use types::{Label, Scalar};
