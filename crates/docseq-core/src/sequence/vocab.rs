//! # Token Vocabulary
//!
//! Append-only set of structural and control tokens discovered while
//! linearizing ground truth. Registration order is kept so the tokenizer
//! that mirrors this vocabulary assigns the same ids on every run.

use std::collections::HashSet;

use tracing::debug;

/// Newline marker used by table ground truth.
pub const NEWLINE_TOKEN: &str = "[NEWLINE]";

/// Default task-start token.
pub const DEFAULT_TASK_START_TOKEN: &str = "<s>";

/// Control tokens the vocabulary is seeded with before any encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTokens {
    /// Token fed to the decoder to start the task.
    pub task_start: String,
    /// Token that ends the prompt. Often the same as `task_start`.
    pub prompt_end: String,
    /// Structural newline marker.
    pub newline: String,
}

impl ControlTokens {
    /// Control tokens with the given task-start token, reused as prompt end.
    pub fn new(task_start: impl Into<String>) -> Self {
        let task_start = task_start.into();
        Self {
            prompt_end: task_start.clone(),
            task_start,
            newline: NEWLINE_TOKEN.to_string(),
        }
    }

    /// Set a distinct prompt-end token.
    pub fn with_prompt_end(mut self, prompt_end: impl Into<String>) -> Self {
        self.prompt_end = prompt_end.into();
        self
    }
}

impl Default for ControlTokens {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_START_TOKEN)
    }
}

/// Growable, never-shrinking token vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashSet<String>,
}

impl Vocabulary {
    /// Create an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a vocabulary from tokens in registration order, e.g. a saved
    /// `added_tokens.json`. Duplicates are kept once.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        vocab.register_tokens(tokens);
        vocab
    }

    /// Create a vocabulary seeded with the control tokens.
    pub fn seeded(control: &ControlTokens) -> Self {
        let mut vocab = Self::new();
        vocab.register_tokens([control.task_start.as_str(), control.prompt_end.as_str()]);
        vocab.register_tokens([control.newline.as_str()]);
        vocab
    }

    /// Register candidate tokens, skipping ones already known.
    ///
    /// Returns how many tokens were actually appended. A non-zero count
    /// means any embedding table mirroring this vocabulary must be resized.
    pub fn register_tokens<I, S>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for token in tokens {
            let token = token.as_ref();
            if self.index.contains(token) {
                continue;
            }
            self.index.insert(token.to_string());
            self.tokens.push(token.to_string());
            added += 1;
        }
        if added > 0 {
            debug!(added, size = self.tokens.len(), "vocabulary grew");
        }
        added
    }

    /// Register `<value/>` tokens for a closed set of categorical values.
    pub fn register_categorical<I, S>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wrapped: Vec<String> = values
            .into_iter()
            .map(|v| categorical_token(v.as_ref()))
            .collect();
        self.register_tokens(wrapped)
    }

    /// Whether the token has been registered.
    pub fn contains(&self, token: &str) -> bool {
        self.index.contains(token)
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// All tokens in registration order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens registered after the vocabulary had `mark` entries.
    ///
    /// Pair with [`Vocabulary::len`] to find what a pass added.
    pub fn added_since(&self, mark: usize) -> &[String] {
        &self.tokens[mark.min(self.tokens.len())..]
    }
}

/// Open tag for a mapping key: `<s_key>`.
pub fn open_token(key: &str) -> String {
    format!("<s_{key}>")
}

/// Close tag for a mapping key: `</s_key>`.
pub fn close_token(key: &str) -> String {
    format!("</s_{key}>")
}

/// Categorical form of a scalar value: `<value/>`.
pub fn categorical_token(value: &str) -> String {
    format!("<{value}/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_adds_once() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.register_tokens(["<s_a>", "<s_a>"]), 1);
        assert_eq!(vocab.len(), 1);
        assert_eq!(vocab.register_tokens(["<s_a>"]), 0);
        assert_eq!(vocab.len(), 1);
    }

    #[test]
    fn registration_keeps_first_seen_order() {
        let mut vocab = Vocabulary::new();
        vocab.register_tokens(["<s_b>", "</s_b>"]);
        vocab.register_tokens(["<s_a>", "<s_b>", "</s_a>"]);
        assert_eq!(vocab.tokens(), &["<s_b>", "</s_b>", "<s_a>", "</s_a>"]);
    }

    #[test]
    fn seeded_vocabulary_dedups_shared_prompt_token() {
        let vocab = Vocabulary::seeded(&ControlTokens::new("<s_cord-v2>"));
        assert_eq!(vocab.tokens(), &["<s_cord-v2>", NEWLINE_TOKEN]);

        let vocab = Vocabulary::seeded(&ControlTokens::new("<s_task>").with_prompt_end("<s_answer>"));
        assert_eq!(vocab.len(), 3);
        assert!(vocab.contains("<s_answer>"));
    }

    #[test]
    fn added_since_reports_new_tail() {
        let mut vocab = Vocabulary::seeded(&ControlTokens::default());
        let mark = vocab.len();
        vocab.register_tokens(["<s_row>", "</s_row>"]);
        assert_eq!(vocab.added_since(mark), &["<s_row>", "</s_row>"]);
        assert!(vocab.added_since(vocab.len() + 5).is_empty());
    }

    #[test]
    fn categorical_tokens_are_wrapped() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.register_categorical(["yes", "no", "yes"]), 2);
        assert!(vocab.contains("<yes/>"));
        assert!(!vocab.contains("yes"));
    }

    #[test]
    fn from_tokens_restores_order_and_lookup() {
        let saved = ["<s>", "[NEWLINE]", "<s_a>", "</s_a>", "<yes/>", "<s_a>"];
        let vocab = Vocabulary::from_tokens(saved);
        assert_eq!(vocab.tokens(), &["<s>", "[NEWLINE]", "<s_a>", "</s_a>", "<yes/>"]);
        assert!(vocab.contains("<yes/>"));
    }

    #[test]
    fn tag_helpers() {
        assert_eq!(open_token("menu"), "<s_menu>");
        assert_eq!(close_token("menu"), "</s_menu>");
        assert_eq!(categorical_token("x"), "<x/>");
    }
}
