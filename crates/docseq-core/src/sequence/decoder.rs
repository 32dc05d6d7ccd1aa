//! # Sequence Decoder
//!
//! Turns a generated token string back into a [`Label`]. Decoding is
//! lenient: an opening tag without its closing tag is dropped, and text
//! that contains no fields at all comes back as `{"text_sequence": ...}`.

use regex::Regex;

use crate::error::Result;
use crate::sequence::encoder::{SEP_TOKEN, TEXT_SEQUENCE_KEY};
use crate::sequence::vocab::Vocabulary;
use crate::types::Label;

/// Decoder for the `<s_k>...</s_k>` bracket grammar.
#[derive(Debug, Clone)]
pub struct SequenceDecoder {
    start_tag: Regex,
}

impl SequenceDecoder {
    /// Create a new decoder.
    pub fn new() -> Result<Self> {
        Ok(Self {
            start_tag: Regex::new(r"(?i)<s_(.*?)>")?,
        })
    }

    /// Decode a token string into a label.
    ///
    /// `vocab` is consulted to unwrap categorical `<value/>` leaves.
    ///
    /// # Examples
    /// ```
    /// use docseq_core::sequence::{SequenceDecoder, Vocabulary};
    /// use docseq_core::types::Label;
    ///
    /// let decoder = SequenceDecoder::new().unwrap();
    /// let label = decoder.decode("<s_cell>1<sep/>2</s_cell>", &Vocabulary::new()).unwrap();
    ///
    /// assert_eq!(label, Label::mapping([("cell", Label::sequence([Label::text("1"), Label::text("2")]))]));
    /// ```
    pub fn decode(&self, tokens: &str, vocab: &Vocabulary) -> Result<Label> {
        self.parse(tokens, false, vocab)
    }

    // Inner calls always return `Label::Sequence`.
    fn parse(&self, tokens: &str, inner: bool, vocab: &Vocabulary) -> Result<Label> {
        let mut tokens = tokens.to_string();
        let mut output: Vec<(String, Label)> = Vec::new();

        while !tokens.is_empty() {
            let Some(caps) = self.start_tag.captures(&tokens) else {
                break;
            };
            let start_token = caps[0].to_string();
            let key = caps[1].to_string();

            let end_tag = Regex::new(&format!("(?i)</s_{}>", regex::escape(&key)))?;
            let Some(end_match) = end_tag.find(&tokens) else {
                tokens = tokens.replace(&start_token, "");
                continue;
            };
            let end_token = end_match.as_str().to_string();
            let end_pos = end_match.end();

            let content_pattern = Regex::new(&format!(
                "(?is){}(.*?){}",
                regex::escape(&start_token),
                regex::escape(&end_token)
            ))?;
            if let Some(content) = content_pattern.captures(&tokens) {
                let content = content[1].trim();
                if content.contains("<s_") && content.contains("</s_") {
                    if let Label::Sequence(items) = self.parse(content, true, vocab)? {
                        if !items.is_empty() {
                            insert(&mut output, key, collapse(items));
                        }
                    }
                } else {
                    let leaves = content
                        .split(SEP_TOKEN)
                        .map(|leaf| Label::text(unwrap_categorical(leaf.trim(), vocab)))
                        .collect();
                    insert(&mut output, key, collapse(leaves));
                }
            }

            tokens = tokens[end_pos..].trim().to_string();
            if let Some(rest) = tokens.strip_prefix(SEP_TOKEN) {
                let mut siblings = vec![Label::Mapping(output)];
                if let Label::Sequence(more) = self.parse(rest, true, vocab)? {
                    siblings.extend(more);
                }
                return Ok(Label::Sequence(siblings));
            }
        }

        Ok(match (output.is_empty(), inner) {
            (false, true) => Label::Sequence(vec![Label::Mapping(output)]),
            (false, false) => Label::Mapping(output),
            (true, true) => Label::Sequence(Vec::new()),
            (true, false) => Label::mapping([(TEXT_SEQUENCE_KEY, Label::text(tokens))]),
        })
    }
}

fn collapse(mut items: Vec<Label>) -> Label {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Label::Sequence(items)
    }
}

// Later values for a repeated key replace earlier ones in place.
fn insert(output: &mut Vec<(String, Label)>, key: String, value: Label) {
    match output.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => output.push((key, value)),
    }
}

fn unwrap_categorical<'a>(leaf: &'a str, vocab: &Vocabulary) -> &'a str {
    if vocab.contains(leaf) && leaf.starts_with('<') && leaf.ends_with("/>") {
        &leaf[1..leaf.len() - 2]
    } else {
        leaf
    }
}
