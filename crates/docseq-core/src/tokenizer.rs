//! # Tokenizer seam
//!
//! The sequence grammar only produces strings; mapping them to ids is the
//! job of a subword tokenizer. [`TextTokenizer`] is the narrow interface the
//! assembler needs, implemented here for Hugging Face `tokenizer.json` files.

use std::path::Path;
use std::str::FromStr;

use tokenizers::{AddedToken, Tokenizer as HfInner};
use tracing::debug;

use crate::error::{DocseqError, Result};

/// Default padding token of Donut-style decoders.
pub const DEFAULT_PAD_TOKEN: &str = "<pad>";

/// Minimal tokenizer interface used to build label tensors.
pub trait TextTokenizer {
    /// Encode text into ids without adding special tokens.
    fn encode_ids(&self, text: &str) -> Result<Vec<u32>>;

    /// Add tokens that must never be split. Returns how much the
    /// vocabulary grew.
    fn add_tokens(&mut self, tokens: &[String]) -> usize;

    /// Vocabulary size including added tokens.
    fn vocab_size(&self) -> usize;

    /// Id of the padding token.
    fn pad_id(&self) -> u32;
}

/// Hugging Face tokenizer with a resolved padding id.
#[derive(Clone)]
pub struct HfTokenizer {
    inner: HfInner,
    pad_id: u32,
}

impl HfTokenizer {
    /// Wrap an already loaded tokenizer.
    pub fn new(inner: HfInner, pad_token: &str) -> Result<Self> {
        let pad_id = inner
            .token_to_id(pad_token)
            .ok_or_else(|| DocseqError::MissingPadToken {
                token: pad_token.to_string(),
            })?;
        Ok(Self { inner, pad_id })
    }

    /// Load a `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P, pad_token: &str) -> Result<Self> {
        let path = path.as_ref();
        let inner =
            HfInner::from_file(path).map_err(|e| DocseqError::TokenizerLoad(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded tokenizer");
        Self::new(inner, pad_token)
    }

    /// Parse the JSON contents of a `tokenizer.json` file.
    pub fn from_json(json: &str, pad_token: &str) -> Result<Self> {
        let inner = HfInner::from_str(json).map_err(|e| DocseqError::TokenizerLoad(e.to_string()))?;
        Self::new(inner, pad_token)
    }

    /// Look up the id of a single token.
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    /// Decode ids back to text, keeping added tokens.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| DocseqError::Tokenize(e.to_string()))
    }

    /// Write the tokenizer, including added tokens, as `tokenizer.json`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.inner
            .save(path, true)
            .map_err(|e| DocseqError::TokenizerLoad(e.to_string()))
    }

    /// The wrapped tokenizer.
    pub fn inner(&self) -> &HfInner {
        &self.inner
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| DocseqError::Tokenize(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn add_tokens(&mut self, tokens: &[String]) -> usize {
        let added: Vec<AddedToken> = tokens
            .iter()
            .map(|t| AddedToken::from(t.clone(), false))
            .collect();
        let before = self.vocab_size();
        self.inner.add_tokens(&added);
        self.vocab_size() - before
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Word-level tokenizer splitting on whitespace and punctuation.
    pub(crate) const WORD_LEVEL_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"<pad>": 0, "<unk>": 1, "hello": 2, "world": 3, "1": 4, "2": 5},
            "unk_token": "<unk>"
        }
    }"#;

    pub(crate) fn word_level() -> HfTokenizer {
        HfTokenizer::from_json(WORD_LEVEL_JSON, DEFAULT_PAD_TOKEN).unwrap()
    }

    #[test]
    fn resolves_pad_id() {
        assert_eq!(word_level().pad_id(), 0);
    }

    #[test]
    fn missing_pad_token_is_an_error() {
        let err = HfTokenizer::from_json(WORD_LEVEL_JSON, "[PAD]").err().unwrap();
        assert!(matches!(err, DocseqError::MissingPadToken { .. }));
    }

    #[test]
    fn added_tokens_are_kept_whole() {
        let mut tokenizer = word_level();
        let base = tokenizer.vocab_size();
        let added = tokenizer.add_tokens(&["<s_greeting>".to_string(), "</s_greeting>".to_string()]);
        assert_eq!(added, 2);
        assert_eq!(tokenizer.vocab_size(), base + 2);

        let open = tokenizer.token_to_id("<s_greeting>").unwrap();
        let close = tokenizer.token_to_id("</s_greeting>").unwrap();
        let ids = tokenizer.encode_ids("<s_greeting>hello world</s_greeting>").unwrap();
        assert_eq!(ids, vec![open, 2, 3, close]);
    }

    #[test]
    fn re_adding_tokens_is_a_no_op() {
        let mut tokenizer = word_level();
        tokenizer.add_tokens(&["<s_x>".to_string()]);
        let size = tokenizer.vocab_size();
        assert_eq!(tokenizer.add_tokens(&["<s_x>".to_string()]), 0);
        assert_eq!(tokenizer.vocab_size(), size);
    }
}
