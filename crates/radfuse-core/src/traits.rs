//! Collaborator contracts.
//!
//! The objectives crate consumes the encoder, task heads, caption decoder,
//! metric sink, and distributed communicator exclusively through these
//! traits. Concrete implementations live with the model and trainer.

use candle_core::Tensor;

use crate::batch::Batch;
use crate::error::CoreResult;
use crate::inference::{InferOutput, InferRequest};

/// Shared multimodal encoder inference interface.
pub trait MultimodalEncoder {
    /// Run one forward pass honoring the request flags.
    fn infer(&self, batch: &Batch, request: &InferRequest) -> CoreResult<InferOutput>;
}

/// Opaque features-to-logits mapping (classification, scoring, projection).
pub trait TaskHead {
    fn forward(&self, feats: &Tensor) -> CoreResult<Tensor>;
}

/// Patch-reconstruction head conditioned on the encoder's restoration order.
pub trait MimHead {
    /// Predict pixel patches `[N, L, P]` from image features.
    fn predict(&self, feats: &Tensor, ids_restore: &Tensor) -> CoreResult<Tensor>;
}

/// Bidirectional similarity head for contrastive matching.
pub trait PairHead {
    /// Returns `(image_to_text_logits, text_to_image_logits)`, each `[N, N]`.
    fn forward(&self, image_feats: &Tensor, text_feats: &Tensor) -> CoreResult<(Tensor, Tensor)>;
}

/// Tokenized caption batch produced by [`CaptionDecoder::tokenize`].
#[derive(Debug, Clone)]
pub struct TokenizedText {
    /// Token ids `[N, T]`.
    pub input_ids: Tensor,
    /// Attention mask `[N, T]`.
    pub attention_mask: Tensor,
}

/// Autoregressive caption decoder with cross-attention conditioning.
///
/// The decoder exposes tokenization and a teacher-forced forward pass; the
/// beam-search loop itself is owned by the objectives crate.
pub trait CaptionDecoder {
    /// Tokenize with truncation and padding to the longest sequence.
    fn tokenize(&self, texts: &[String], max_len: usize) -> CoreResult<TokenizedText>;

    /// Next-token logits `[N, T, V]` for `input_ids` attending over
    /// `encoder_hidden_states`.
    fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: Option<&Tensor>,
        encoder_hidden_states: &Tensor,
    ) -> CoreResult<Tensor>;

    /// Decode token ids to text, skipping special tokens.
    fn detokenize(&self, ids: &[Vec<u32>]) -> CoreResult<Vec<String>>;

    fn pad_token_id(&self) -> u32;
    fn bos_token_id(&self) -> u32;
    fn eos_token_id(&self) -> u32;
    fn vocab_size(&self) -> usize;
}

/// Key-value scalar logging sink, keyed `"{task}/{phase}/{metric}"`.
pub trait MetricSink {
    fn log_scalar(&self, key: &str, value: f32);
}

/// Sink that emits scalars as structured tracing events.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn log_scalar(&self, key: &str, value: f32) {
        tracing::info!(target: "radfuse::metrics", key, value);
    }
}

/// Sink that drops every scalar (benchmarks, tests).
#[derive(Debug, Default, Clone)]
pub struct NullSink;

impl MetricSink for NullSink {
    fn log_scalar(&self, _key: &str, _value: f32) {}
}

/// Pre-established distributed process group.
///
/// `all_gather_*` must preserve per-process list ordering so gathered
/// scores and ids stay correctly paired after concatenation.
pub trait DistributedComm {
    fn rank(&self) -> usize;
    fn world_size(&self) -> usize;

    /// Hard synchronization barrier. A stall in any process blocks all.
    fn barrier(&self) -> CoreResult<()>;

    /// Gather each process's buffer, indexed by rank.
    fn all_gather_f32(&self, local: &[f32]) -> CoreResult<Vec<Vec<f32>>>;

    /// Gather each process's buffer, indexed by rank.
    fn all_gather_i64(&self, local: &[i64]) -> CoreResult<Vec<Vec<i64>>>;
}

/// Single-process communicator: barriers are no-ops and gathers return the
/// local buffer alone.
#[derive(Debug, Default, Clone)]
pub struct LocalComm;

impl DistributedComm for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn barrier(&self) -> CoreResult<()> {
        Ok(())
    }

    fn all_gather_f32(&self, local: &[f32]) -> CoreResult<Vec<Vec<f32>>> {
        Ok(vec![local.to_vec()])
    }

    fn all_gather_i64(&self, local: &[i64]) -> CoreResult<Vec<Vec<i64>>> {
        Ok(vec![local.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_comm_is_single_process() {
        let comm = LocalComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.world_size(), 1);
        assert!(comm.barrier().is_ok());

        let gathered = comm.all_gather_f32(&[1.0, 2.0]).unwrap();
        assert_eq!(gathered, vec![vec![1.0, 2.0]]);

        let gathered = comm.all_gather_i64(&[7, 8]).unwrap();
        assert_eq!(gathered, vec![vec![7, 8]]);
    }
}
