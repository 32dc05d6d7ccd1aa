//! Decoder embedding resize after vocabulary growth.

use std::cmp::Ordering;

use candle_core::{bail, Result, Tensor};
use candle_nn::Embedding;
use tracing::debug;

use crate::dataset::VocabGrowth;

/// Resize a `(vocab, hidden)` embedding matrix to `new_vocab_size` rows.
///
/// New rows are initialized to the mean of the existing embeddings; a
/// smaller size keeps the leading rows.
pub fn resize_token_embeddings(weights: &Tensor, new_vocab_size: usize) -> Result<Embedding> {
    let (old_vocab_size, hidden) = weights.dims2()?;
    let resized = match new_vocab_size.cmp(&old_vocab_size) {
        Ordering::Equal => weights.clone(),
        Ordering::Less => weights.narrow(0, 0, new_vocab_size)?,
        Ordering::Greater => {
            if old_vocab_size == 0 {
                bail!("cannot grow an empty embedding table");
            }
            let mean = weights.mean_keepdim(0)?;
            let extra = mean
                .broadcast_as((new_vocab_size - old_vocab_size, hidden))?
                .contiguous()?;
            Tensor::cat(&[weights, &extra], 0)?
        }
    };
    debug!(from = old_vocab_size, to = new_vocab_size, "resized token embeddings");
    Ok(Embedding::new(resized, hidden))
}

/// Apply a growth signal, returning `None` when no resize is needed.
pub fn apply_growth(weights: &Tensor, growth: &VocabGrowth) -> Result<Option<Embedding>> {
    if !growth.needs_resize() {
        return Ok(None);
    }
    resize_token_embeddings(weights, growth.vocab_size).map(Some)
}
