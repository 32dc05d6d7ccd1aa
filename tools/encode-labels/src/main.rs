use clap::Parser;
use docseq_core::sequence::{ControlTokens, SequenceDecoder, SequenceEncoder, Vocabulary};
use docseq_core::types::Label;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

#[derive(Debug, Serialize, Deserialize)]
pub struct EncodeOutput {
    pub input: String,
    pub sequence: Option<String>,
    pub decoded: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Read one JSON label per stdin line and print its target sequence.
#[derive(Parser)]
#[command(name = "docseq-encode")]
#[command(version)]
struct Cli {
    /// Register structural tokens while encoding
    #[arg(long)]
    track: bool,

    /// Keep keys in source order
    #[arg(long)]
    no_sort: bool,

    /// Decode each sequence back and include the result
    #[arg(long)]
    round_trip: bool,

    /// Print the collected vocabulary after the last line
    #[arg(long)]
    print_vocab: bool,
}

fn encode_line(
    line: &str,
    encoder: &SequenceEncoder,
    decoder: Option<&SequenceDecoder>,
    vocab: &mut Vocabulary,
) -> EncodeOutput {
    let label = match Label::from_json_str(line) {
        Ok(label) => label,
        Err(e) => {
            return EncodeOutput {
                input: line.to_string(),
                sequence: None,
                decoded: None,
                error: Some(e.to_string()),
            };
        }
    };

    let sequence = encoder.encode(&label, vocab);
    let (decoded, error) = match decoder.map(|d| d.decode(&sequence, vocab)) {
        Some(Ok(label)) => (Some(label.to_json()), None),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, None),
    };

    EncodeOutput {
        input: line.to_string(),
        sequence: Some(sequence),
        decoded,
        error,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let encoder = SequenceEncoder::new(cli.track, !cli.no_sort);
    let decoder = if cli.round_trip {
        Some(SequenceDecoder::new()?)
    } else {
        None
    };
    let mut vocab = Vocabulary::seeded(&ControlTokens::default());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = encode_line(line, &encoder, decoder.as_ref(), &mut vocab);
        writeln!(out, "{}", serde_json::to_string(&output)?)?;
    }

    if cli.print_vocab {
        writeln!(out, "{}", serde_json::to_string(vocab.tokens())?)?;
    }
    Ok(())
}
