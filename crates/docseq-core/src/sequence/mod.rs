pub mod assembler;
pub mod decoder;
pub mod encoder;
pub mod vocab;

pub use assembler::{pad_and_mask, EncodedExample, ExampleAssembler, DEFAULT_IGNORE_ID, DEFAULT_MAX_LENGTH};
pub use decoder::SequenceDecoder;
pub use encoder::{SequenceEncoder, SEP_TOKEN, TEXT_SEQUENCE_KEY};
pub use vocab::{ControlTokens, Vocabulary, DEFAULT_TASK_START_TOKEN, NEWLINE_TOKEN};
