//! Cleanup of generated sequences before scoring.

use regex::Regex;

/// Strips special tokens and spacing artifacts from decoder output.
#[derive(Debug, Clone)]
pub struct PredictionCleaner {
    eos_token: String,
    pad_token: String,
    first_tag: Regex,
}

impl PredictionCleaner {
    /// Create a cleaner for the given end-of-sequence and padding tokens.
    pub fn new(eos_token: impl Into<String>, pad_token: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            eos_token: eos_token.into(),
            pad_token: pad_token.into(),
            first_tag: Regex::new(r"<.*?>")?,
        })
    }

    /// Remove eos/pad tokens and the leading task-start token.
    pub fn clean_generated(&self, sequence: &str) -> String {
        let mut seq = sequence.to_string();
        for special in [&self.eos_token, &self.pad_token] {
            if !special.is_empty() {
                seq = seq.replace(special.as_str(), "");
            }
        }
        self.first_tag.replacen(&seq, 1, "").trim().to_string()
    }

    /// Drop the eos token from a reference answer.
    pub fn clean_answer(&self, answer: &str) -> String {
        if self.eos_token.is_empty() {
            answer.to_string()
        } else {
            answer.replace(self.eos_token.as_str(), "")
        }
    }
}

/// Remove a space directly after `>` or directly before `</s_`.
///
/// Subword decoding inserts these around structural tokens.
pub fn normalize_prediction(prediction: &str) -> String {
    prediction.replace("> ", ">").replace(" </s_", "</s_")
}
