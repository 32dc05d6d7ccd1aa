//! Dataset preparation settings.

use std::path::Path;

use anyhow::Context;
use docseq_core::sequence::{
    ControlTokens, ExampleAssembler, DEFAULT_IGNORE_ID, DEFAULT_MAX_LENGTH, DEFAULT_TASK_START_TOKEN,
};
use serde::{Deserialize, Serialize};

/// Settings shared by every split of one preparation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Number of label positions per example.
    pub max_length: usize,
    /// Label value written over padding.
    pub ignore_id: i64,
    /// Token fed to the decoder to start the task.
    pub task_start_token: String,
    /// Prompt-end token; the task-start token when unset.
    pub prompt_end_token: Option<String>,
    /// Visit JSON keys in reverse-lexicographic order.
    pub sort_json_key: bool,
    /// Appended to every target sequence when set.
    pub eos_token: Option<String>,
    /// Seed for target selection and epoch shuffling.
    pub seed: u64,
    /// Closed set of scalar values emitted as `<value/>` tokens.
    pub categorical_values: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            ignore_id: DEFAULT_IGNORE_ID,
            task_start_token: DEFAULT_TASK_START_TOKEN.to_string(),
            prompt_end_token: None,
            sort_json_key: true,
            eos_token: None,
            seed: 0,
            categorical_values: Vec::new(),
        }
    }
}

impl DatasetConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Set the label length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the ignore id.
    pub fn with_ignore_id(mut self, ignore_id: i64) -> Self {
        self.ignore_id = ignore_id;
        self
    }

    /// Set the task-start token.
    pub fn with_task_start_token(mut self, token: impl Into<String>) -> Self {
        self.task_start_token = token.into();
        self
    }

    /// Set a distinct prompt-end token.
    pub fn with_prompt_end_token(mut self, token: impl Into<String>) -> Self {
        self.prompt_end_token = Some(token.into());
        self
    }

    /// Enable or disable key sorting.
    pub fn with_sort_json_key(mut self, sort: bool) -> Self {
        self.sort_json_key = sort;
        self
    }

    /// Append an end-of-sequence token to every target.
    pub fn with_eos_token(mut self, token: impl Into<String>) -> Self {
        self.eos_token = Some(token.into());
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the categorical values.
    pub fn with_categorical_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Control tokens the vocabulary is seeded with.
    pub fn control_tokens(&self) -> ControlTokens {
        let control = ControlTokens::new(self.task_start_token.clone());
        match &self.prompt_end_token {
            Some(prompt_end) => control.with_prompt_end(prompt_end.clone()),
            None => control,
        }
    }

    /// Assembler matching these settings.
    pub fn assembler(&self) -> ExampleAssembler {
        ExampleAssembler::new(self.max_length, self.ignore_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_donut_settings() {
        let config = DatasetConfig::default();
        assert_eq!(config.max_length, 768);
        assert_eq!(config.ignore_id, -100);
        assert!(config.sort_json_key);
        assert_eq!(config.control_tokens().prompt_end, "<s>");
    }

    #[test]
    fn builder_overrides() {
        let config = DatasetConfig::new()
            .with_max_length(32)
            .with_task_start_token("<s_cord-v2>")
            .with_sort_json_key(false)
            .with_eos_token("</s>");
        assert_eq!(config.max_length, 32);
        assert_eq!(config.control_tokens().task_start, "<s_cord-v2>");
        assert_eq!(config.control_tokens().prompt_end, "<s_cord-v2>");
        assert_eq!(config.eos_token.as_deref(), Some("</s>"));
        assert_eq!(config.assembler().max_length, 32);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: DatasetConfig =
            serde_json::from_str(r#"{"max_length": 128, "prompt_end_token": "<s_answer>"}"#).unwrap();
        assert_eq!(config.max_length, 128);
        assert_eq!(config.ignore_id, -100);
        assert_eq!(config.control_tokens().prompt_end, "<s_answer>");
        assert!(config.categorical_values.is_empty());
    }

    #[test]
    fn categorical_values_from_json() {
        let config: DatasetConfig =
            serde_json::from_str(r#"{"categorical_values": ["yes", "no"]}"#).unwrap();
        assert_eq!(config, DatasetConfig::new().with_categorical_values(["yes", "no"]));
    }
}
