//! # Sequence Encoder
//!
//! Linearizes a [`Label`] into the bracket grammar used as a generation
//! target:
//!
//! * mapping key `k` becomes `<s_k>` ... `</s_k>`
//! * sequence items are joined with `<sep/>`
//! * a scalar is emitted as text, or as `<value/>` when that categorical
//!   token is registered
//!
//! Keys are ordered reverse-lexicographically when sorting is enabled.
//! The grammar is not guaranteed to be invertible: scalar text containing
//! `<sep/>` is indistinguishable from a list boundary.

use crate::sequence::vocab::{categorical_token, close_token, open_token, Vocabulary};
use crate::types::{Label, Scalar};

/// Separator between sequence items.
pub const SEP_TOKEN: &str = "<sep/>";

/// Mapping key whose value is already flattened text.
pub const TEXT_SEQUENCE_KEY: &str = "text_sequence";

/// Recursive JSON-to-token-sequence encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEncoder {
    /// Register `<s_k>` / `</s_k>` for every key seen. Enabled for the
    /// training split only.
    pub track_new_tokens: bool,
    /// Visit mapping keys in reverse-lexicographic order instead of
    /// source order.
    pub sort_keys: bool,
}

impl Default for SequenceEncoder {
    fn default() -> Self {
        Self {
            track_new_tokens: true,
            sort_keys: true,
        }
    }
}

impl SequenceEncoder {
    /// Create an encoder with explicit switches.
    pub fn new(track_new_tokens: bool, sort_keys: bool) -> Self {
        Self {
            track_new_tokens,
            sort_keys,
        }
    }

    /// Encode a label into a token string.
    ///
    /// # Examples
    /// ```
    /// use docseq_core::sequence::{SequenceEncoder, Vocabulary};
    /// use docseq_core::types::Label;
    ///
    /// let mut vocab = Vocabulary::new();
    /// let label = Label::mapping([("cell", Label::sequence([Label::text("1"), Label::text("2")]))]);
    /// let encoded = SequenceEncoder::default().encode(&label, &mut vocab);
    ///
    /// assert_eq!(encoded, "<s_cell>1<sep/>2</s_cell>");
    /// assert!(vocab.contains("</s_cell>"));
    /// ```
    pub fn encode(&self, label: &Label, vocab: &mut Vocabulary) -> String {
        let mut out = String::new();
        self.encode_into(label, vocab, &mut out);
        out
    }

    fn encode_into(&self, label: &Label, vocab: &mut Vocabulary, out: &mut String) {
        match label {
            Label::Mapping(entries) => {
                if let [(key, value)] = entries.as_slice() {
                    if key == TEXT_SEQUENCE_KEY {
                        self.passthrough(value, vocab, out);
                        return;
                    }
                }

                let mut ordered: Vec<&(String, Label)> = entries.iter().collect();
                if self.sort_keys {
                    // stable, so duplicate keys keep their source order
                    ordered.sort_by(|a, b| b.0.cmp(&a.0));
                }

                for (key, value) in ordered {
                    let open = open_token(key);
                    let close = close_token(key);
                    if self.track_new_tokens {
                        vocab.register_tokens([open.as_str(), close.as_str()]);
                    }
                    out.push_str(&open);
                    self.encode_into(value, vocab, out);
                    out.push_str(&close);
                }
            }
            Label::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(SEP_TOKEN);
                    }
                    self.encode_into(item, vocab, out);
                }
            }
            Label::Scalar(scalar) => out.push_str(&scalar_token(scalar, vocab)),
        }
    }

    // `text_sequence` carries text that is already linearized. Anything
    // other than a string still goes through the grammar.
    fn passthrough(&self, value: &Label, vocab: &mut Vocabulary, out: &mut String) {
        match value {
            Label::Scalar(Scalar::Text(text)) => out.push_str(text),
            other => self.encode_into(other, vocab, out),
        }
    }
}

fn scalar_token(scalar: &Scalar, vocab: &Vocabulary) -> String {
    let text = scalar.to_string();
    let categorical = categorical_token(&text);
    if vocab.contains(&categorical) {
        categorical
    } else {
        text
    }
}
