use thiserror::Error;

/// Errors that can occur during docseq core operations.
#[derive(Debug, Error)]
pub enum DocseqError {
    /// The tokenizer file could not be loaded.
    #[error("failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    /// The tokenizer failed to encode a target sequence.
    #[error("tokenization error: {0}")]
    Tokenize(String),

    /// The tokenizer does not know the configured padding token.
    #[error("padding token {token:?} is not in the tokenizer vocabulary")]
    MissingPadToken {
        /// The padding token that was looked up.
        token: String,
    },

    /// A sequence pattern failed to compile.
    #[error("regex compilation error: {0}")]
    RegexError(#[from] regex::Error),

    /// Candle ML framework error.
    #[error("tensor error: {0}")]
    CandleError(#[from] candle_core::Error),
}

/// Result type alias for docseq operations.
pub type Result<T> = std::result::Result<T, DocseqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = DocseqError::MissingPadToken {
            token: "<pad>".into(),
        };
        assert!(err.to_string().contains("<pad>"));

        let err = DocseqError::Tokenize("bad input".into());
        assert_eq!(err.to_string(), "tokenization error: bad input");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DocseqError>();
    }
}
